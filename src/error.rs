use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Registry backend is unreachable: {0}")]
    Transport(String),
    #[error("Registry rejected {command}: {message}")]
    Rejected { command: String, message: String },
    #[error("Failed to decode {command} response: {message}")]
    Decode { command: String, message: String },
    #[error("Invalid registry endpoint: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Invalid payload on {channel}: {message}")]
    InvalidPayload { channel: String, message: String },
    #[error("Failed to subscribe to {channel}: {message}")]
    Subscribe { channel: String, message: String },
    #[error("Failed to emit {channel}: {message}")]
    Emit { channel: String, message: String },
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Failed to access preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse preferences file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Preference store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read shell config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse shell config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to install log subscriber: {0}")]
    Logging(String),
    #[error("Shell runtime is not running")]
    RuntimeStopped,
}
