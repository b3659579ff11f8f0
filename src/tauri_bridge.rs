use serde_json::Value;
use tauri::{AppHandle, Emitter, Listener, Runtime};
use tracing::warn;

use crate::error::BridgeError;
use crate::events::{ChannelHandler, EventEmitter, EventSource, ListenerId, WebviewPublisher};

/// Event source backed by the Tauri app's global event bus.
pub struct TauriEventSource<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriEventSource<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> EventSource for TauriEventSource<R> {
    fn listen(&self, channel: &str, handler: ChannelHandler) -> Result<ListenerId, BridgeError> {
        let event_id = self
            .app
            .listen(channel.to_string(), move |event| handler(event.payload()));
        Ok(ListenerId(u64::from(event_id)))
    }

    fn unlisten(&self, listener: ListenerId) {
        match u32::try_from(listener.0) {
            Ok(event_id) => self.app.unlisten(event_id),
            Err(_) => warn!(listener = listener.0, "listener id out of range for tauri"),
        }
    }
}

impl<R: Runtime> EventEmitter for AppHandle<R> {
    fn emit_event(&self, channel: &str, payload: Value) -> Result<(), BridgeError> {
        Emitter::emit(self, channel, payload).map_err(|error| BridgeError::Emit {
            channel: channel.to_string(),
            message: error.to_string(),
        })
    }
}

/// Shell observer that emits every outbound event to the app's webviews.
pub type TauriShellPublisher<R> = WebviewPublisher<AppHandle<R>>;
