use std::fmt;

use crate::constants::{PLACEHOLDER_PROJECT_ID, PROJECTS_ROUTE_PREFIX};

/// Route as seen by the shell: `/projects/{id}` plus an optional sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRoute {
    /// No project segment at all.
    Unselected,
    /// `/projects/default`: resolve the project for me.
    Placeholder { sub_path: String },
    Project { project_id: String, sub_path: String },
}

impl ProjectRoute {
    pub fn placeholder() -> Self {
        Self::Placeholder {
            sub_path: String::new(),
        }
    }

    pub fn project(project_id: impl Into<String>) -> Self {
        Self::Project {
            project_id: project_id.into(),
            sub_path: String::new(),
        }
    }

    pub fn parse(path: &str) -> Self {
        let without_query = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = without_query
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty());

        if segments.next() != Some(PROJECTS_ROUTE_PREFIX) {
            return Self::Unselected;
        }
        let Some(raw_id) = segments.next() else {
            return Self::Unselected;
        };

        let project_id = urlencoding::decode(raw_id)
            .map(|value| value.into_owned())
            .unwrap_or_else(|_| raw_id.to_string());
        let rest = segments.collect::<Vec<_>>();
        let sub_path = if rest.is_empty() {
            String::new()
        } else {
            format!("/{}", rest.join("/"))
        };

        if project_id.trim().is_empty() {
            Self::Unselected
        } else if project_id == PLACEHOLDER_PROJECT_ID {
            Self::Placeholder { sub_path }
        } else {
            Self::Project {
                project_id,
                sub_path,
            }
        }
    }

    /// Concrete project id carried by the route. The placeholder is not one.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Project { project_id, .. } => Some(project_id),
            Self::Unselected | Self::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    /// Same route pointed at `project_id`, keeping the sub-path.
    pub fn resolved_to(&self, project_id: &str) -> Self {
        let sub_path = match self {
            Self::Placeholder { sub_path } | Self::Project { sub_path, .. } => sub_path.clone(),
            Self::Unselected => String::new(),
        };
        Self::Project {
            project_id: project_id.to_string(),
            sub_path,
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Self::Unselected => "/".to_string(),
            Self::Placeholder { sub_path } => {
                format!("/{PROJECTS_ROUTE_PREFIX}/{PLACEHOLDER_PROJECT_ID}{sub_path}")
            }
            Self::Project {
                project_id,
                sub_path,
            } => format!(
                "/{PROJECTS_ROUTE_PREFIX}/{}{sub_path}",
                urlencoding::encode(project_id)
            ),
        }
    }
}

impl fmt::Display for ProjectRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}
