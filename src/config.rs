use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    BACKEND_URL_ENV, DEFAULT_BACKEND_URL, DEFAULT_LOG_FILTER, DEFAULT_REQUEST_TIMEOUT_MS,
    LOG_FILTER_ENV, MAX_REQUEST_TIMEOUT_MS, MIN_REQUEST_TIMEOUT_MS, SUPPORTED_URL_SCHEMES,
};
use crate::error::ConfigError;

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout_ms: default_request_timeout_ms(),
            preferences_file: None,
            log_filter: default_log_filter(),
        }
    }
}

impl ShellConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Reads the config file (missing file means defaults), applies process
/// environment overrides and normalizes the result.
pub fn load_shell_config(path: Option<&Path>) -> Result<ShellConfig, ConfigError> {
    let config = match path {
        Some(path) => read_config_file(path)?,
        None => ShellConfig::default(),
    };
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    normalize_shell_config(config)
}

fn read_config_file(path: &Path) -> Result<ShellConfig, ConfigError> {
    if !path.is_file() {
        return Ok(ShellConfig::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(ShellConfig::default());
    }

    serde_json::from_str::<ShellConfig>(&raw).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

pub fn apply_env_overrides(
    mut config: ShellConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ShellConfig {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(backend_url) = non_empty(BACKEND_URL_ENV) {
        config.backend_url = backend_url;
    }
    if let Some(log_filter) = non_empty(LOG_FILTER_ENV) {
        config.log_filter = log_filter;
    }
    config
}

pub fn normalize_shell_config(mut config: ShellConfig) -> Result<ShellConfig, ConfigError> {
    config.backend_url = normalize_backend_url(&config.backend_url)?;
    config.request_timeout_ms = config
        .request_timeout_ms
        .clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS);

    let log_filter = config.log_filter.trim();
    config.log_filter = if log_filter.is_empty() {
        default_log_filter()
    } else {
        log_filter.to_string()
    };

    config.preferences_file = config
        .preferences_file
        .filter(|path| !path.as_os_str().is_empty());

    Ok(config)
}

pub(crate) fn normalize_backend_url(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid("backendUrl must be a non-empty URL.".to_string()));
    }

    let mut parsed = Url::parse(trimmed)
        .map_err(|error| ConfigError::Invalid(format!("backendUrl is not a valid URL: {error}")))?;
    let scheme = parsed.scheme().to_lowercase();
    if !SUPPORTED_URL_SCHEMES.contains(&scheme.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "backendUrl must use http or https, got \"{scheme}\"."
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::Invalid("backendUrl must include a host.".to_string()));
    }

    parsed.set_query(None);
    parsed.set_fragment(None);
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed.to_string())
}
