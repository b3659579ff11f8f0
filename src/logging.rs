use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ShellError;

/// Installs the global fmt subscriber. A second call reports an error
/// instead of replacing the installed subscriber.
pub fn init_logging(filter: &str) -> Result<(), ShellError> {
    let filter = EnvFilter::try_new(filter.trim())
        .map_err(|error| ShellError::Logging(format!("invalid log filter: {error}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| ShellError::Logging(error.to_string()))
}
