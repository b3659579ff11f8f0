use std::sync::Arc;

use tracing::info;

mod constants;

pub mod config;
pub mod dtos;
pub mod embed_protocol;
pub mod error;
pub mod events;
pub mod list_view;
pub mod logging;
pub mod preferences;
pub mod registry_client;
pub mod routing;
pub mod runtime;
pub mod selection;
pub mod shell;
pub mod shortcuts;
pub mod validation;

#[cfg(feature = "tauri")]
pub mod tauri_bridge;

pub use config::{load_shell_config, ShellConfig};
pub use dtos::{Project, RegistrySnapshot, ShortcutPreferences};
pub use error::{BridgeError, ConfigError, PreferenceError, RegistryError, ShellError};
pub use events::{
    EventBridge, EventEmitter, EventSource, InputSink, LocalEventSource, WebviewPublisher,
};
pub use preferences::{JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use registry_client::{HttpRegistryClient, RegistryClient};
pub use routing::ProjectRoute;
pub use runtime::{RuntimeHandle, ShellObserver, ShellRuntime};
pub use shell::{DesktopShell, ShellInput, ShellPhase, UiAction};

/// A running shell: the loop, its registry client and the desktop event
/// subscriptions.
pub struct DesktopSession {
    // Field order is drop order: listeners detach before the loop stops.
    bridge: EventBridge,
    runtime: ShellRuntime,
}

impl DesktopSession {
    pub fn handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }
}

/// Starts a session against the HTTP registry named in `config`.
pub fn launch(
    config: &ShellConfig,
    source: Arc<dyn EventSource>,
    observer: Box<dyn ShellObserver>,
) -> Result<DesktopSession, ShellError> {
    let client = HttpRegistryClient::new(&config.backend_url, config.request_timeout())?;
    let preferences: Box<dyn PreferenceStore> = match config.preferences_file.as_ref() {
        Some(path) => Box::new(JsonFilePreferenceStore::new(path)),
        None => Box::new(MemoryPreferenceStore::new()),
    };
    info!(backend_url = %config.backend_url, "launching desktop shell");
    launch_with_client(Arc::new(client), preferences, source, observer)
}

pub fn launch_with_client(
    client: Arc<dyn RegistryClient>,
    preferences: Box<dyn PreferenceStore>,
    source: Arc<dyn EventSource>,
    observer: Box<dyn ShellObserver>,
) -> Result<DesktopSession, ShellError> {
    let shell = DesktopShell::new(ProjectRoute::Unselected, preferences);
    let runtime = ShellRuntime::spawn(client, shell, observer);
    let handle = runtime.handle();

    let bridge = EventBridge::attach(source, Arc::new(handle.clone()))?;
    handle.send(ShellInput::Bootstrap)?;

    Ok(DesktopSession { bridge, runtime })
}
