use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    DEFAULT_NEW_SPEC_SHORTCUT, DEFAULT_QUICK_SWITCHER_SHORTCUT, DEFAULT_TOGGLE_WINDOW_SHORTCUT,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: String,
    pub specs_dir: String,
    pub last_accessed: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Registry state as reported by the backend at one point in time.
///
/// Snapshots are never patched: every backend response replaces the held
/// snapshot as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub active_project_id: Option<String>,
    #[serde(default)]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_url: Option<String>,
}

impl RegistrySnapshot {
    pub fn find(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == project_id)
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.find(project_id).is_some()
    }

    /// Active id, only when it names a project present in this snapshot.
    pub fn active_project(&self) -> Option<&Project> {
        self.active_project_id
            .as_deref()
            .and_then(|project_id| self.find(project_id))
    }

    pub fn project_ids(&self) -> Vec<String> {
        self.projects.iter().map(|project| project.id.clone()).collect()
    }

    pub fn shortcuts(&self) -> ShortcutPreferences {
        ShortcutPreferences::from_config(&self.config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutPreferences {
    pub toggle_window: String,
    pub quick_switcher: String,
    pub new_spec: String,
}

impl Default for ShortcutPreferences {
    fn default() -> Self {
        Self {
            toggle_window: DEFAULT_TOGGLE_WINDOW_SHORTCUT.to_string(),
            quick_switcher: DEFAULT_QUICK_SWITCHER_SHORTCUT.to_string(),
            new_spec: DEFAULT_NEW_SPEC_SHORTCUT.to_string(),
        }
    }
}

impl ShortcutPreferences {
    /// Reads the `shortcuts` section of the opaque config blob without
    /// modifying it. Missing or blank entries keep their defaults.
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("shortcuts");
        let read = |field: &str, fallback: String| {
            section
                .and_then(|shortcuts| shortcuts.get(field))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .unwrap_or(fallback)
        };

        Self {
            toggle_window: read("toggleWindow", defaults.toggle_window),
            quick_switcher: read("quickSwitcher", defaults.quick_switcher),
            new_spec: read("newSpec", defaults.new_spec),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_project(id: &str, name: &str) -> Project {
    Project {
        id: id.to_string(),
        name: name.to_string(),
        path: format!("/home/dev/{name}"),
        specs_dir: format!("/home/dev/{name}/specs"),
        last_accessed: "2024-05-01T10:00:00Z".to_string(),
        favorite: false,
        color: None,
        description: None,
    }
}

#[cfg(test)]
pub(crate) fn test_snapshot(projects: Vec<Project>, active: Option<&str>) -> RegistrySnapshot {
    RegistrySnapshot {
        projects,
        active_project_id: active.map(ToOwned::to_owned),
        config: Value::Null,
        ui_url: None,
    }
}
