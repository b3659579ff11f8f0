use std::cmp::{Ordering, Reverse};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::constants::{RECENT_PROJECTS_LIMIT, SORT_BY_PREFERENCE_KEY, VIEW_MODE_PREFERENCE_KEY};
use crate::dtos::Project;
use crate::error::PreferenceError;
use crate::preferences::PreferenceStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::List => "list",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "grid" => Some(Self::Grid),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    LastAccessed,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::LastAccessed => "lastAccessed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "name" => Some(Self::Name),
            "lastAccessed" | "last-accessed" | "recent" => Some(Self::LastAccessed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterTab {
    #[default]
    All,
    Favorites,
    Recent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewPreferences {
    pub view_mode: ViewMode,
    pub sort_key: SortKey,
    pub filter_tab: FilterTab,
    pub search_query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListViewCommand {
    Open,
    SetViewMode(ViewMode),
    SetSortKey(SortKey),
    SetFilterTab(FilterTab),
    SetSearchQuery(String),
}

/// Filters, searches and orders `projects` for display. Deterministic and
/// side-effect free; the recent tab carries its own ordering.
///
/// The recent tab caps to the most recently accessed projects before the
/// search runs, so searching there only narrows that capped set.
pub fn derive_project_list<'a>(
    projects: &'a [Project],
    preferences: &ListViewPreferences,
) -> Vec<&'a Project> {
    let mut rows = match preferences.filter_tab {
        FilterTab::All => projects.iter().collect::<Vec<_>>(),
        FilterTab::Favorites => projects.iter().filter(|project| project.favorite).collect(),
        FilterTab::Recent => {
            let mut recent = projects.iter().collect::<Vec<_>>();
            recent.sort_by_cached_key(|project| Reverse(parse_last_accessed(&project.last_accessed)));
            recent.truncate(RECENT_PROJECTS_LIMIT);
            recent
        }
    };

    let query = preferences.search_query.to_lowercase();
    if !query.is_empty() {
        rows.retain(|project| matches_search(project, &query));
    }

    if preferences.filter_tab != FilterTab::Recent {
        match preferences.sort_key {
            SortKey::Name => rows.sort_by(|left, right| compare_names(&left.name, &right.name)),
            SortKey::LastAccessed => rows.sort_by_cached_key(|project| {
                Reverse(parse_last_accessed(&project.last_accessed))
            }),
        }
    }

    rows
}

fn matches_search(project: &Project, lowered_query: &str) -> bool {
    project.name.to_lowercase().contains(lowered_query)
        || project.path.to_lowercase().contains(lowered_query)
}

fn parse_last_accessed(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

/// Base letters only: decomposed, diacritics dropped, lower-cased.
fn collation_key(value: &str) -> String {
    value
        .trim()
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case- and accent-insensitive name ordering. Names equal at that level
/// fall back to accent-aware, then raw comparison.
pub(crate) fn compare_names(left: &str, right: &str) -> Ordering {
    collation_key(left)
        .cmp(&collation_key(right))
        .then_with(|| left.trim().to_lowercase().cmp(&right.trim().to_lowercase()))
        .then_with(|| left.cmp(right))
}

/// Preference state of the project list. View mode and sort key persist
/// through the store; tab and query live for one opening of the list.
pub struct ListViewModel {
    preferences: ListViewPreferences,
    store: Box<dyn PreferenceStore>,
}

impl ListViewModel {
    pub fn load(store: Box<dyn PreferenceStore>) -> Self {
        let view_mode = read_preference(store.as_ref(), VIEW_MODE_PREFERENCE_KEY)
            .and_then(|value| ViewMode::parse(&value))
            .unwrap_or_default();
        let sort_key = read_preference(store.as_ref(), SORT_BY_PREFERENCE_KEY)
            .and_then(|value| SortKey::parse(&value))
            .unwrap_or_default();

        Self {
            preferences: ListViewPreferences {
                view_mode,
                sort_key,
                ..ListViewPreferences::default()
            },
            store,
        }
    }

    pub fn preferences(&self) -> &ListViewPreferences {
        &self.preferences
    }

    pub fn open(&mut self) {
        self.preferences.filter_tab = FilterTab::All;
        self.preferences.search_query.clear();
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) -> Result<(), PreferenceError> {
        self.preferences.view_mode = view_mode;
        self.store.set(VIEW_MODE_PREFERENCE_KEY, view_mode.as_str())
    }

    pub fn set_sort_key(&mut self, sort_key: SortKey) -> Result<(), PreferenceError> {
        self.preferences.sort_key = sort_key;
        self.store.set(SORT_BY_PREFERENCE_KEY, sort_key.as_str())
    }

    pub fn set_filter_tab(&mut self, filter_tab: FilterTab) {
        self.preferences.filter_tab = filter_tab;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.preferences.search_query = query.into();
    }

    pub fn apply(&mut self, command: ListViewCommand) -> Result<(), PreferenceError> {
        match command {
            ListViewCommand::Open => self.open(),
            ListViewCommand::SetViewMode(view_mode) => self.set_view_mode(view_mode)?,
            ListViewCommand::SetSortKey(sort_key) => self.set_sort_key(sort_key)?,
            ListViewCommand::SetFilterTab(filter_tab) => self.set_filter_tab(filter_tab),
            ListViewCommand::SetSearchQuery(query) => self.set_search_query(query),
        }
        Ok(())
    }

    pub fn derive<'a>(&self, projects: &'a [Project]) -> Vec<&'a Project> {
        derive_project_list(projects, &self.preferences)
    }
}

fn read_preference(store: &dyn PreferenceStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(error) => {
            warn!(key, %error, "failed to read list view preference; using default");
            None
        }
    }
}
