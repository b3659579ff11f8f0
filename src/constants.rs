use std::time::Duration;

pub(crate) const PLACEHOLDER_PROJECT_ID: &str = "default";
pub(crate) const PROJECTS_ROUTE_PREFIX: &str = "projects";
pub(crate) const RECENT_PROJECTS_LIMIT: usize = 20;

pub(crate) const VIEW_MODE_PREFERENCE_KEY: &str = "view-mode";
pub(crate) const SORT_BY_PREFERENCE_KEY: &str = "sort-by";

pub(crate) const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:4319/";
pub(crate) const DEFAULT_LOG_FILTER: &str = "info";
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
pub(crate) const SUPPORTED_URL_SCHEMES: [&str; 2] = ["http", "https"];

pub(crate) const BACKEND_URL_ENV: &str = "LEANSPEC_DESKTOP_BACKEND_URL";
pub(crate) const LOG_FILTER_ENV: &str = "LEANSPEC_DESKTOP_LOG";

pub(crate) const PROJECT_UNREACHABLE_MESSAGE: &str = "Project directory is no longer reachable.";

pub(crate) const DEFAULT_TOGGLE_WINDOW_SHORTCUT: &str = "CommandOrControl+Shift+L";
pub(crate) const DEFAULT_QUICK_SWITCHER_SHORTCUT: &str = "CommandOrControl+Shift+K";
pub(crate) const DEFAULT_NEW_SPEC_SHORTCUT: &str = "CommandOrControl+Shift+N";

pub(crate) const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
