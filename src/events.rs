use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::dtos::RegistrySnapshot;
use crate::embed_protocol::EmbedMessage;
use crate::error::BridgeError;
use crate::routing::ProjectRoute;
use crate::runtime::ShellObserver;
use crate::shell::{ShellInput, ShellPhase, UiAction};
use crate::validation::SweepSummary;

/// Outbound channel carrying the resolved active project id (or null).
pub const ACTIVE_PROJECT_EVENT: &str = "desktop://active-project";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesktopChannel {
    StateUpdated,
    TraySwitchProject,
    TrayRefreshProjects,
    TrayAddProject,
    TrayCheckUpdates,
    TrayPreferences,
    MenuNewSpec,
    MenuFind,
    MenuToggleSidebar,
    MenuShortcuts,
    MenuLogs,
    MenuAbout,
    ShortcutQuickSwitcher,
    ShortcutNewSpec,
}

impl DesktopChannel {
    pub const ALL: [Self; 14] = [
        Self::StateUpdated,
        Self::TraySwitchProject,
        Self::TrayRefreshProjects,
        Self::TrayAddProject,
        Self::TrayCheckUpdates,
        Self::TrayPreferences,
        Self::MenuNewSpec,
        Self::MenuFind,
        Self::MenuToggleSidebar,
        Self::MenuShortcuts,
        Self::MenuLogs,
        Self::MenuAbout,
        Self::ShortcutQuickSwitcher,
        Self::ShortcutNewSpec,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::StateUpdated => "desktop://state-updated",
            Self::TraySwitchProject => "desktop://tray-switch-project",
            Self::TrayRefreshProjects => "desktop://tray-refresh-projects",
            Self::TrayAddProject => "desktop://tray-add-project",
            Self::TrayCheckUpdates => "desktop://tray-check-updates",
            Self::TrayPreferences => "desktop://tray-preferences",
            Self::MenuNewSpec => "desktop://menu-new-spec",
            Self::MenuFind => "desktop://menu-find",
            Self::MenuToggleSidebar => "desktop://menu-toggle-sidebar",
            Self::MenuShortcuts => "desktop://menu-shortcuts",
            Self::MenuLogs => "desktop://menu-logs",
            Self::MenuAbout => "desktop://menu-about",
            Self::ShortcutQuickSwitcher => "desktop://shortcut-quick-switcher",
            Self::ShortcutNewSpec => "desktop://shortcut-new-spec",
        }
    }
}

/// Decodes a raw channel payload into a shell input. Payloads are JSON as
/// emitted by the backend; action channels carry `null`.
pub fn decode_channel_event(
    channel: DesktopChannel,
    payload: &str,
) -> Result<ShellInput, BridgeError> {
    let invalid = |message: String| BridgeError::InvalidPayload {
        channel: channel.name().to_string(),
        message,
    };

    let input = match channel {
        DesktopChannel::StateUpdated => {
            let snapshot = serde_json::from_str::<RegistrySnapshot>(payload)
                .map_err(|error| invalid(error.to_string()))?;
            ShellInput::SnapshotPushed(snapshot)
        }
        DesktopChannel::TraySwitchProject => {
            let project_id = serde_json::from_str::<Value>(payload)
                .map_err(|error| invalid(error.to_string()))?
                .as_str()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .ok_or_else(|| invalid("expected a non-empty project id string".to_string()))?;
            ShellInput::OpenProject(project_id)
        }
        DesktopChannel::TrayRefreshProjects => ShellInput::RefreshProjects,
        DesktopChannel::TrayAddProject => ShellInput::AddProject,
        DesktopChannel::TrayCheckUpdates => ShellInput::CheckForUpdates,
        DesktopChannel::TrayPreferences => ShellInput::UiAction(UiAction::OpenPreferences),
        DesktopChannel::MenuNewSpec | DesktopChannel::ShortcutNewSpec => {
            ShellInput::UiAction(UiAction::NewSpec)
        }
        DesktopChannel::MenuFind => ShellInput::UiAction(UiAction::Find),
        DesktopChannel::MenuToggleSidebar => ShellInput::UiAction(UiAction::ToggleSidebar),
        DesktopChannel::MenuShortcuts => ShellInput::UiAction(UiAction::ShowShortcuts),
        DesktopChannel::MenuLogs => ShellInput::UiAction(UiAction::OpenLogs),
        DesktopChannel::MenuAbout => ShellInput::UiAction(UiAction::ShowAbout),
        DesktopChannel::ShortcutQuickSwitcher => ShellInput::UiAction(UiAction::QuickSwitcher),
    };

    Ok(input)
}

/// Shell output addressed to the webview, one named channel per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent<'a> {
    Navigate { route: &'a ProjectRoute, replace: bool },
    ActiveProject(Option<&'a str>),
    UiAction(UiAction),
    OpenExternal(&'a Url),
    OperationFailed { operation: &'a str, message: &'a str },
    SweepFinished(SweepSummary),
    Phase(&'a ShellPhase),
    Embed(&'a EmbedMessage),
}

impl OutboundEvent<'_> {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "desktop://navigate",
            Self::ActiveProject(_) => ACTIVE_PROJECT_EVENT,
            Self::UiAction(_) => "desktop://ui-action",
            Self::OpenExternal(_) => "desktop://open-external",
            Self::OperationFailed { .. } => "desktop://operation-failed",
            Self::SweepFinished(_) => "desktop://validation-sweep-finished",
            Self::Phase(_) => "desktop://shell-phase",
            Self::Embed(_) => "desktop://embed-message",
        }
    }

    pub fn payload(&self) -> Result<Value, BridgeError> {
        let value = match self {
            Self::Navigate { route, replace } => {
                json!({ "path": route.to_path(), "replace": replace })
            }
            Self::ActiveProject(project_id) => json!(project_id),
            Self::OpenExternal(url) => json!(url.as_str()),
            Self::OperationFailed { operation, message } => {
                json!({ "operation": operation, "message": message })
            }
            Self::UiAction(action) => self.encode(action)?,
            Self::SweepFinished(summary) => self.encode(summary)?,
            Self::Phase(phase) => self.encode(phase)?,
            Self::Embed(message) => self.encode(message)?,
        };
        Ok(value)
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Value, BridgeError> {
        serde_json::to_value(value).map_err(|error| BridgeError::InvalidPayload {
            channel: self.channel().to_string(),
            message: error.to_string(),
        })
    }
}

/// Outbound half of the desktop event bus.
pub trait EventEmitter: Send + Sync {
    fn emit_event(&self, channel: &str, payload: Value) -> Result<(), BridgeError>;
}

/// Forwards every shell observation to the webview on its outbound channel.
pub struct WebviewPublisher<E: EventEmitter> {
    emitter: E,
}

impl<E: EventEmitter> WebviewPublisher<E> {
    pub fn new(emitter: E) -> Self {
        Self { emitter }
    }

    fn publish(&self, event: OutboundEvent<'_>) {
        let channel = event.channel();
        let published = event
            .payload()
            .and_then(|payload| self.emitter.emit_event(channel, payload));
        if let Err(error) = published {
            warn!(channel, %error, "failed to publish shell event");
        }
    }
}

impl<E: EventEmitter> ShellObserver for WebviewPublisher<E> {
    fn on_navigate(&self, route: &ProjectRoute, replace: bool) {
        self.publish(OutboundEvent::Navigate { route, replace });
    }

    fn on_active_project(&self, project_id: Option<&str>) {
        self.publish(OutboundEvent::ActiveProject(project_id));
    }

    fn on_ui_action(&self, action: UiAction) {
        self.publish(OutboundEvent::UiAction(action));
    }

    fn on_open_external(&self, url: &Url) {
        self.publish(OutboundEvent::OpenExternal(url));
    }

    fn on_operation_failed(&self, operation: &str, message: &str) {
        warn!(operation, message, "desktop operation failed");
        self.publish(OutboundEvent::OperationFailed { operation, message });
    }

    fn on_sweep_finished(&self, summary: SweepSummary) {
        self.publish(OutboundEvent::SweepFinished(summary));
    }

    fn on_phase(&self, phase: &ShellPhase) {
        self.publish(OutboundEvent::Phase(phase));
    }

    fn on_embed_message(&self, message: &EmbedMessage) {
        self.publish(OutboundEvent::Embed(message));
    }
}

pub type ChannelHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Named notification channels the shell can subscribe to.
pub trait EventSource: Send + Sync {
    fn listen(&self, channel: &str, handler: ChannelHandler) -> Result<ListenerId, BridgeError>;
    fn unlisten(&self, listener: ListenerId);
}

/// Receiver of decoded inputs.
pub trait InputSink: Send + Sync {
    fn deliver(&self, input: ShellInput);
}

impl InputSink for Sender<ShellInput> {
    fn deliver(&self, input: ShellInput) {
        if self.send(input).is_err() {
            debug!("input receiver dropped; discarding desktop event");
        }
    }
}

/// One live listener. Dropping it unregisters the handler.
pub struct Subscription {
    source: Arc<dyn EventSource>,
    listener: ListenerId,
    channel: DesktopChannel,
}

impl Subscription {
    pub fn acquire(
        source: &Arc<dyn EventSource>,
        channel: DesktopChannel,
        handler: ChannelHandler,
    ) -> Result<Self, BridgeError> {
        let listener = source.listen(channel.name(), handler)?;
        Ok(Self {
            source: source.clone(),
            listener,
            channel,
        })
    }

    pub fn channel(&self) -> DesktopChannel {
        self.channel
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unlisten(self.listener);
        debug!(channel = self.channel.name(), "released desktop event listener");
    }
}

/// Every desktop channel subscription for one UI scope. Acquisition is
/// all-or-nothing; dropping the bridge releases every listener.
pub struct EventBridge {
    subscriptions: Vec<Subscription>,
}

impl EventBridge {
    pub fn attach(
        source: Arc<dyn EventSource>,
        sink: Arc<dyn InputSink>,
    ) -> Result<Self, BridgeError> {
        let mut subscriptions = Vec::with_capacity(DesktopChannel::ALL.len());
        for channel in DesktopChannel::ALL {
            let sink = sink.clone();
            let handler: ChannelHandler =
                Arc::new(move |payload: &str| match decode_channel_event(channel, payload) {
                    Ok(input) => sink.deliver(input),
                    Err(error) => warn!(channel = channel.name(), %error, "dropping desktop event"),
                });
            subscriptions.push(Subscription::acquire(&source, channel, handler)?);
        }
        Ok(Self { subscriptions })
    }

    pub fn channels(&self) -> Vec<DesktopChannel> {
        self.subscriptions
            .iter()
            .map(Subscription::channel)
            .collect()
    }
}

#[derive(Default)]
struct LocalListeners {
    next_id: u64,
    by_channel: HashMap<String, Vec<(ListenerId, ChannelHandler)>>,
}

/// In-process event source, used when the shell and the emitter share a
/// process and in tests.
#[derive(Clone, Default)]
pub struct LocalEventSource {
    listeners: Arc<Mutex<LocalListeners>>,
}

impl LocalEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `payload` to every listener of `channel`; returns how many
    /// handlers ran.
    pub fn emit(&self, channel: &str, payload: &str) -> usize {
        let handlers = match self.listeners.lock() {
            Ok(listeners) => listeners
                .by_channel
                .get(channel)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(_, handler)| handler.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            Err(_) => return 0,
        };
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.by_channel.get(channel).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl EventEmitter for LocalEventSource {
    fn emit_event(&self, channel: &str, payload: Value) -> Result<(), BridgeError> {
        self.emit(channel, &payload.to_string());
        Ok(())
    }
}

impl EventSource for LocalEventSource {
    fn listen(&self, channel: &str, handler: ChannelHandler) -> Result<ListenerId, BridgeError> {
        let mut listeners = self.listeners.lock().map_err(|_| BridgeError::Subscribe {
            channel: channel.to_string(),
            message: "listener registry lock poisoned".to_string(),
        })?;
        listeners.next_id += 1;
        let listener = ListenerId(listeners.next_id);
        listeners
            .by_channel
            .entry(channel.to_string())
            .or_default()
            .push((listener, handler));
        Ok(listener)
    }

    fn unlisten(&self, listener: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            for entries in listeners.by_channel.values_mut() {
                entries.retain(|(id, _)| *id != listener);
            }
            listeners.by_channel.retain(|_, entries| !entries.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct FailingSource {
        inner: LocalEventSource,
        fail_on: DesktopChannel,
    }

    impl EventSource for FailingSource {
        fn listen(
            &self,
            channel: &str,
            handler: ChannelHandler,
        ) -> Result<ListenerId, BridgeError> {
            if channel == self.fail_on.name() {
                return Err(BridgeError::Subscribe {
                    channel: channel.to_string(),
                    message: "window closed".to_string(),
                });
            }
            self.inner.listen(channel, handler)
        }

        fn unlisten(&self, listener: ListenerId) {
            self.inner.unlisten(listener);
        }
    }

    fn total_listeners(source: &LocalEventSource) -> usize {
        DesktopChannel::ALL
            .iter()
            .map(|channel| source.listener_count(channel.name()))
            .sum()
    }

    #[test]
    fn channel_names_are_distinct_desktop_channels() {
        let names = DesktopChannel::ALL
            .iter()
            .map(|channel| channel.name())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(names.len(), DesktopChannel::ALL.len());
        assert!(names.iter().all(|name| name.starts_with("desktop://")));
        assert!(!names.contains(ACTIVE_PROJECT_EVENT));
    }

    #[test]
    fn outbound_events_carry_webview_payloads() {
        let route = ProjectRoute::project("a");
        let navigate = OutboundEvent::Navigate {
            route: &route,
            replace: true,
        };
        assert_eq!(navigate.channel(), "desktop://navigate");
        assert_eq!(
            navigate.payload().unwrap(),
            json!({ "path": "/projects/a", "replace": true })
        );

        let reply = EmbedMessage::ActiveProject {
            project_id: Some("a".to_string()),
        };
        assert_eq!(
            OutboundEvent::Embed(&reply).payload().unwrap(),
            json!({ "type": "active-project", "payload": { "projectId": "a" } })
        );
        assert_eq!(
            OutboundEvent::UiAction(UiAction::ToggleWindow).payload().unwrap(),
            json!("toggle-window")
        );
        assert_eq!(
            OutboundEvent::ActiveProject(None).payload().unwrap(),
            Value::Null
        );
    }

    #[test]
    fn webview_publisher_forwards_every_observation() {
        let source = LocalEventSource::new();
        let (sender, receiver) = mpsc::channel::<(String, String)>();
        let channels = [
            "desktop://navigate",
            "desktop://ui-action",
            "desktop://embed-message",
            "desktop://operation-failed",
        ];
        for channel in channels {
            let sender = Mutex::new(sender.clone());
            source
                .listen(
                    channel,
                    Arc::new(move |payload: &str| {
                        if let Ok(sender) = sender.lock() {
                            let _ = sender.send((channel.to_string(), payload.to_string()));
                        }
                    }),
                )
                .unwrap();
        }

        let publisher = WebviewPublisher::new(source.clone());
        publisher.on_navigate(&ProjectRoute::project("n"), false);
        publisher.on_ui_action(UiAction::QuickSwitcher);
        publisher.on_embed_message(&EmbedMessage::ActiveProject { project_id: None });
        publisher.on_operation_failed("switch-project", "connection reset");

        let received = receiver.try_iter().collect::<Vec<_>>();
        let payloads = received
            .into_iter()
            .map(|(channel, payload)| (channel, serde_json::from_str::<Value>(&payload).unwrap()))
            .collect::<Vec<_>>();
        assert_eq!(
            payloads,
            vec![
                (
                    "desktop://navigate".to_string(),
                    json!({ "path": "/projects/n", "replace": false })
                ),
                ("desktop://ui-action".to_string(), json!("quick-switcher")),
                (
                    "desktop://embed-message".to_string(),
                    json!({ "type": "active-project", "payload": { "projectId": null } })
                ),
                (
                    "desktop://operation-failed".to_string(),
                    json!({ "operation": "switch-project", "message": "connection reset" })
                ),
            ]
        );
    }

    #[test]
    fn decodes_tray_switch_and_rejects_blank_ids() {
        assert!(matches!(
            decode_channel_event(DesktopChannel::TraySwitchProject, "\"abc\""),
            Ok(ShellInput::OpenProject(id)) if id == "abc"
        ));
        assert!(matches!(
            decode_channel_event(DesktopChannel::TraySwitchProject, "\"  \""),
            Err(BridgeError::InvalidPayload { .. })
        ));
        assert!(decode_channel_event(DesktopChannel::StateUpdated, "{not json").is_err());
    }

    #[test]
    fn repeated_attach_and_detach_never_accumulates_listeners() {
        let source = LocalEventSource::new();
        let (sender, receiver) = mpsc::channel();
        let sink: Arc<dyn InputSink> = Arc::new(sender);

        for _ in 0..3 {
            let bridge = EventBridge::attach(Arc::new(source.clone()), sink.clone()).unwrap();
            assert_eq!(bridge.channels().len(), DesktopChannel::ALL.len());
            assert_eq!(source.listener_count(DesktopChannel::TrayRefreshProjects.name()), 1);
            drop(bridge);
        }
        assert_eq!(total_listeners(&source), 0);

        let _bridge = EventBridge::attach(Arc::new(source.clone()), sink).unwrap();
        assert_eq!(source.emit(DesktopChannel::TrayAddProject.name(), "null"), 1);
        assert!(matches!(receiver.try_recv(), Ok(ShellInput::AddProject)));
    }

    #[test]
    fn failed_setup_releases_already_acquired_listeners() {
        let local = LocalEventSource::new();
        let source = FailingSource {
            inner: local.clone(),
            fail_on: DesktopChannel::MenuLogs,
        };
        let (sender, _receiver) = mpsc::channel();

        let result = EventBridge::attach(Arc::new(source), Arc::new(sender));
        assert!(matches!(result, Err(BridgeError::Subscribe { .. })));
        assert_eq!(total_listeners(&local), 0);
    }

    #[test]
    fn malformed_payloads_are_dropped_not_delivered() {
        let source = LocalEventSource::new();
        let (sender, receiver) = mpsc::channel();
        let _bridge = EventBridge::attach(Arc::new(source.clone()), Arc::new(sender)).unwrap();

        source.emit(DesktopChannel::StateUpdated.name(), "42");
        assert!(receiver.try_recv().is_err());
    }
}
