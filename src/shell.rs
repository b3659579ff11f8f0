use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::dtos::{Project, RegistrySnapshot};
use crate::embed_protocol::{validate_external_url, EmbedMessage};
use crate::error::RegistryError;
use crate::list_view::{ListViewCommand, ListViewModel, ListViewPreferences};
use crate::preferences::PreferenceStore;
use crate::registry_client::{RegistryCall, RemoteOutcome};
use crate::routing::ProjectRoute;
use crate::selection::{SelectionCoordinator, SelectionEffect};
use crate::shortcuts::{KeyPress, ShortcutAction, ShortcutMap};
use crate::validation::{SweepSummary, ValidationEffect, ValidationOrchestrator, ValidationState};

/// Actions the shell only forwards to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiAction {
    ToggleWindow,
    OpenPreferences,
    NewSpec,
    Find,
    ToggleSidebar,
    ShowShortcuts,
    OpenLogs,
    ShowAbout,
    QuickSwitcher,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub seq: u64,
    pub request_id: Uuid,
    pub call: RegistryCall,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCompletion {
    pub seq: u64,
    pub request_id: Uuid,
    pub call: RegistryCall,
    pub result: Result<RemoteOutcome, RegistryError>,
}

impl RemoteRequest {
    pub fn complete(self, result: Result<RemoteOutcome, RegistryError>) -> RemoteCompletion {
        RemoteCompletion {
            seq: self.seq,
            request_id: self.request_id,
            call: self.call,
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellInput {
    Bootstrap,
    RouteChanged(String),
    SnapshotPushed(RegistrySnapshot),
    OpenProject(String),
    RefreshProjects,
    AddProject,
    CheckForUpdates,
    ToggleFavorite(String),
    RemoveProject(String),
    RenameProject { project_id: String, name: String },
    ValidateProject(String),
    RefreshValidation(String),
    ValidateAll,
    ListView(ListViewCommand),
    UiAction(UiAction),
    KeyPressed(KeyPress),
    Embed(EmbedMessage),
    RemoteCompleted(RemoteCompletion),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum ShellPhase {
    Loading,
    Ready,
    BootstrapFailed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellEffect {
    Remote(RemoteRequest),
    Navigate { route: ProjectRoute, replace: bool },
    PublishActiveProject(Option<String>),
    PostToEmbed(EmbedMessage),
    Present(UiAction),
    OpenExternal(Url),
    OperationFailed { operation: &'static str, message: String },
    ValidationSweepFinished(SweepSummary),
    PhaseChanged(ShellPhase),
}

/// One row of the derived project list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRow<'a> {
    pub project: &'a Project,
    pub validation: ValidationState,
    pub is_active: bool,
}

/// The desktop shell state machine. Every input runs to completion and
/// returns the effects the runtime must carry out.
pub struct DesktopShell {
    phase: ShellPhase,
    bootstrap_in_flight: bool,
    snapshot: Option<Arc<RegistrySnapshot>>,
    selection: SelectionCoordinator,
    validation: ValidationOrchestrator,
    list_view: ListViewModel,
    shortcuts: ShortcutMap,
    next_seq: u64,
    last_snapshot_seq: u64,
    published_active: Option<Option<String>>,
}

impl DesktopShell {
    pub fn new(route: ProjectRoute, preferences: Box<dyn PreferenceStore>) -> Self {
        Self {
            phase: ShellPhase::Loading,
            bootstrap_in_flight: false,
            snapshot: None,
            selection: SelectionCoordinator::new(route),
            validation: ValidationOrchestrator::new(),
            list_view: ListViewModel::load(preferences),
            shortcuts: ShortcutMap::default(),
            next_seq: 0,
            last_snapshot_seq: 0,
            published_active: None,
        }
    }

    pub fn phase(&self) -> &ShellPhase {
        &self.phase
    }

    pub fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.snapshot.clone()
    }

    pub fn route(&self) -> &ProjectRoute {
        self.selection.route()
    }

    pub fn effective_project_id(&self) -> Option<&str> {
        self.selection.effective_project_id()
    }

    pub fn validation_state(&self, project_id: &str) -> ValidationState {
        self.validation.state(project_id)
    }

    pub fn list_preferences(&self) -> &ListViewPreferences {
        self.list_view.preferences()
    }

    pub fn project_list(&self) -> Vec<ProjectRow<'_>> {
        let Some(snapshot) = self.snapshot.as_deref() else {
            return Vec::new();
        };
        let effective = self.selection.effective_project_id();
        self.list_view
            .derive(&snapshot.projects)
            .into_iter()
            .map(|project| ProjectRow {
                project,
                validation: self.validation.state(&project.id),
                is_active: effective == Some(project.id.as_str()),
            })
            .collect()
    }

    pub fn handle(&mut self, input: ShellInput) -> Vec<ShellEffect> {
        let mut effects = Vec::new();

        match input {
            ShellInput::Bootstrap => self.start_bootstrap(&mut effects),
            ShellInput::RouteChanged(path) => {
                if self.selection.observe_route(ProjectRoute::parse(&path)) {
                    self.reconcile(&mut effects);
                }
            }
            ShellInput::RemoteCompleted(completion) => self.complete(completion, &mut effects),
            ShellInput::ListView(command) => {
                if let Err(error) = self.list_view.apply(command) {
                    warn!(%error, "failed to persist list view preference");
                    effects.push(ShellEffect::OperationFailed {
                        operation: "save-preferences",
                        message: error.to_string(),
                    });
                }
            }
            other if self.phase != ShellPhase::Ready => {
                debug!(input = ?other, phase = ?self.phase, "shell not ready; ignoring input");
            }
            ShellInput::SnapshotPushed(snapshot) => {
                self.apply_snapshot(snapshot, false, &mut effects);
            }
            ShellInput::OpenProject(project_id) => {
                let selection = self.selection.request_project(&project_id);
                self.push_selection(selection, &mut effects);
                self.reconcile(&mut effects);
            }
            ShellInput::RefreshProjects => self.remote(RegistryCall::RefreshProjects, &mut effects),
            ShellInput::AddProject => {
                self.selection.begin_pending_navigation();
                self.remote(RegistryCall::AddProject, &mut effects);
            }
            ShellInput::CheckForUpdates => self.remote(RegistryCall::CheckForUpdates, &mut effects),
            ShellInput::ToggleFavorite(project_id) => {
                self.remote(RegistryCall::ToggleFavorite(project_id), &mut effects)
            }
            ShellInput::RemoveProject(project_id) => {
                self.remote(RegistryCall::RemoveProject(project_id), &mut effects)
            }
            ShellInput::RenameProject { project_id, name } => {
                match normalize_project_name(&name) {
                    Ok(name) => {
                        self.remote(RegistryCall::RenameProject { project_id, name }, &mut effects)
                    }
                    Err(message) => effects.push(ShellEffect::OperationFailed {
                        operation: "rename-project",
                        message,
                    }),
                }
            }
            ShellInput::ValidateProject(project_id) => {
                let dispatch = self.validation.request(&project_id, false);
                self.push_validation(dispatch.into_iter().collect(), &mut effects);
            }
            ShellInput::RefreshValidation(project_id) => {
                let dispatch = self.validation.request(&project_id, true);
                self.push_validation(dispatch.into_iter().collect(), &mut effects);
            }
            ShellInput::ValidateAll => {
                let project_ids = self
                    .snapshot
                    .as_deref()
                    .map(RegistrySnapshot::project_ids)
                    .unwrap_or_default();
                let sweep = self.validation.validate_all(&project_ids);
                self.push_validation(sweep, &mut effects);
            }
            ShellInput::UiAction(action) => self.present(action, &mut effects),
            ShellInput::KeyPressed(press) => match self.shortcuts.resolve(&press) {
                Some(action) => return self.handle(shortcut_input(action)),
                None => debug!(key = %press.key, "unbound key press"),
            },
            ShellInput::Embed(message) => self.handle_embed(message, &mut effects),
        }

        effects
    }

    fn start_bootstrap(&mut self, effects: &mut Vec<ShellEffect>) {
        if self.bootstrap_in_flight || self.phase == ShellPhase::Ready {
            debug!("bootstrap already requested");
            return;
        }
        self.bootstrap_in_flight = true;
        self.set_phase(ShellPhase::Loading, effects);
        self.reconcile(effects);
        self.remote(RegistryCall::Bootstrap, effects);
    }

    fn complete(&mut self, completion: RemoteCompletion, effects: &mut Vec<ShellEffect>) {
        let RemoteCompletion {
            seq,
            request_id,
            call,
            result,
        } = completion;
        let command = call.command();

        if let RegistryCall::Bootstrap = call {
            self.bootstrap_in_flight = false;
            match result {
                Ok(RemoteOutcome::Snapshot(snapshot)) => {
                    info!(%request_id, projects = snapshot.projects.len(), "registry bootstrapped");
                    self.last_snapshot_seq = self.last_snapshot_seq.max(seq);
                    self.set_phase(ShellPhase::Ready, effects);
                    self.apply_snapshot(snapshot, true, effects);
                }
                Ok(other) => self.unexpected_outcome(command, &other),
                Err(error) => {
                    warn!(%request_id, %error, "registry bootstrap failed");
                    self.set_phase(
                        ShellPhase::BootstrapFailed {
                            message: error.to_string(),
                        },
                        effects,
                    );
                }
            }
            return;
        }

        if self.phase != ShellPhase::Ready {
            debug!(%request_id, command, "dropping completion while shell is not ready");
            return;
        }

        match (call, result) {
            (RegistryCall::ValidateProject(project_id), Ok(RemoteOutcome::Validation(valid))) => {
                debug!(%request_id, project_id, valid, "validation finished");
                let follow_up = self.validation.complete(&project_id, Ok(valid));
                self.push_validation(follow_up, effects);
            }
            (RegistryCall::ValidateProject(project_id), Err(error)) => {
                warn!(%request_id, project_id, %error, "validation call failed");
                let follow_up = self.validation.complete(&project_id, Err(error.to_string()));
                self.push_validation(follow_up, effects);
            }
            (RegistryCall::CheckForUpdates, Ok(RemoteOutcome::Done)) => {
                debug!(%request_id, "update check finished");
            }
            (call, Ok(RemoteOutcome::Snapshot(snapshot))) => {
                if seq < self.last_snapshot_seq {
                    warn!(
                        %request_id,
                        command,
                        seq,
                        latest = self.last_snapshot_seq,
                        "registry response arrived out of order; applying as latest"
                    );
                }
                self.last_snapshot_seq = self.last_snapshot_seq.max(seq);
                let add_completed = matches!(call, RegistryCall::AddProject);
                self.apply_snapshot(snapshot, add_completed, effects);
            }
            (call, Err(error)) => {
                warn!(%request_id, command, %error, "registry call failed; keeping prior snapshot");
                match &call {
                    RegistryCall::SwitchProject(project_id) => {
                        self.selection.switch_failed(project_id)
                    }
                    RegistryCall::AddProject => self.selection.cancel_pending_navigation(),
                    _ => {}
                }
                effects.push(ShellEffect::OperationFailed {
                    operation: command,
                    message: error.to_string(),
                });
            }
            (_, Ok(other)) => self.unexpected_outcome(command, &other),
        }
    }

    fn unexpected_outcome(&self, command: &str, outcome: &RemoteOutcome) {
        warn!(command, ?outcome, "registry returned an unexpected outcome");
    }

    /// Replaces the held snapshot. An equal snapshot is a no-op unless
    /// `always_reconcile` is set (an add-project completion that may carry
    /// an unchanged registry).
    fn apply_snapshot(
        &mut self,
        snapshot: RegistrySnapshot,
        always_reconcile: bool,
        effects: &mut Vec<ShellEffect>,
    ) {
        let unchanged = self.snapshot.as_deref() == Some(&snapshot);
        if unchanged && !always_reconcile {
            debug!("snapshot unchanged; skipping");
            return;
        }

        if !unchanged {
            let config_changed = self
                .snapshot
                .as_deref()
                .map_or(true, |current| current.config != snapshot.config);
            if config_changed {
                self.shortcuts = ShortcutMap::from_preferences(&snapshot.shortcuts());
            }
            self.snapshot = Some(Arc::new(snapshot));
        }

        self.reconcile(effects);

        let project_ids = self
            .snapshot
            .as_deref()
            .map(RegistrySnapshot::project_ids)
            .unwrap_or_default();
        let auto_validation = self.validation.observe_projects(&project_ids);
        self.push_validation(auto_validation, effects);
    }

    fn reconcile(&mut self, effects: &mut Vec<ShellEffect>) {
        let loading = self.phase != ShellPhase::Ready;
        let snapshot = self.snapshot.clone();
        let selection = self.selection.reconcile(snapshot.as_deref(), loading);
        self.push_selection(selection, effects);

        if loading {
            return;
        }
        let effective = self.selection.effective_project_id().map(ToOwned::to_owned);
        if self.published_active.as_ref() != Some(&effective) {
            self.published_active = Some(effective.clone());
            effects.push(ShellEffect::PublishActiveProject(effective));
        }
    }

    fn push_selection(&mut self, selection: Vec<SelectionEffect>, effects: &mut Vec<ShellEffect>) {
        for effect in selection {
            match effect {
                SelectionEffect::Navigate { route, replace } => {
                    effects.push(ShellEffect::Navigate { route, replace })
                }
                SelectionEffect::SwitchProject(project_id) => {
                    self.remote(RegistryCall::SwitchProject(project_id), effects)
                }
            }
        }
    }

    fn push_validation(
        &mut self,
        validation: Vec<ValidationEffect>,
        effects: &mut Vec<ShellEffect>,
    ) {
        for effect in validation {
            match effect {
                ValidationEffect::Dispatch(project_id) => {
                    self.remote(RegistryCall::ValidateProject(project_id), effects)
                }
                ValidationEffect::SweepFinished(summary) => {
                    effects.push(ShellEffect::ValidationSweepFinished(summary))
                }
            }
        }
    }

    fn remote(&mut self, call: RegistryCall, effects: &mut Vec<ShellEffect>) {
        self.next_seq += 1;
        let request = RemoteRequest {
            seq: self.next_seq,
            request_id: Uuid::new_v4(),
            call,
        };
        debug!(
            request_id = %request.request_id,
            command = request.call.command(),
            project_id = request.call.project_id(),
            "queueing registry call"
        );
        effects.push(ShellEffect::Remote(request));
    }

    fn set_phase(&mut self, phase: ShellPhase, effects: &mut Vec<ShellEffect>) {
        if self.phase == phase {
            return;
        }
        self.phase = phase.clone();
        effects.push(ShellEffect::PhaseChanged(phase));
    }

    fn present(&mut self, action: UiAction, effects: &mut Vec<ShellEffect>) {
        if action == UiAction::QuickSwitcher {
            self.list_view.open();
        }
        effects.push(ShellEffect::Present(action));
    }

    fn handle_embed(&mut self, message: EmbedMessage, effects: &mut Vec<ShellEffect>) {
        match message {
            EmbedMessage::Ready | EmbedMessage::RequestActiveProject => {
                effects.push(ShellEffect::PostToEmbed(EmbedMessage::ActiveProject {
                    project_id: self.selection.effective_project_id().map(ToOwned::to_owned),
                }));
            }
            EmbedMessage::Navigate { path } => {
                let selection = self.selection.request_route(ProjectRoute::parse(&path));
                self.push_selection(selection, effects);
                self.reconcile(effects);
            }
            EmbedMessage::OpenExternal { url } => match validate_external_url(&url) {
                Ok(url) => effects.push(ShellEffect::OpenExternal(url)),
                Err(error) => warn!(%error, "refusing to open external url"),
            },
            EmbedMessage::ActiveProject { .. } => {
                debug!("ignoring inbound active-project message");
            }
        }
    }
}

fn shortcut_input(action: ShortcutAction) -> ShellInput {
    match action {
        ShortcutAction::ToggleWindow => ShellInput::UiAction(UiAction::ToggleWindow),
        ShortcutAction::QuickSwitcher => ShellInput::UiAction(UiAction::QuickSwitcher),
        ShortcutAction::NewSpec => ShellInput::UiAction(UiAction::NewSpec),
        ShortcutAction::RefreshProjects => ShellInput::RefreshProjects,
        ShortcutAction::OpenProject => ShellInput::AddProject,
        ShortcutAction::Find => ShellInput::UiAction(UiAction::Find),
        ShortcutAction::ToggleSidebar => ShellInput::UiAction(UiAction::ToggleSidebar),
    }
}

fn normalize_project_name(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Project name cannot be empty.".to_string());
    }
    if trimmed.chars().any(char::is_control) {
        return Err("Project name cannot contain control characters.".to_string());
    }
    Ok(trimmed.to_string())
}
