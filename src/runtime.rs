use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};
use url::Url;

use crate::constants::RUNTIME_SHUTDOWN_TIMEOUT;
use crate::embed_protocol::{decode_embed_message, EmbedMessage};
use crate::error::ShellError;
use crate::events::InputSink;
use crate::registry_client::{dispatch, RegistryClient};
use crate::routing::ProjectRoute;
use crate::shell::{
    DesktopShell, RemoteCompletion, RemoteRequest, ShellEffect, ShellInput, ShellPhase, UiAction,
};
use crate::validation::SweepSummary;

/// Receives the effects the shell cannot carry out itself.
#[allow(unused_variables)]
pub trait ShellObserver: Send {
    fn on_navigate(&self, route: &ProjectRoute, replace: bool) {}
    fn on_active_project(&self, project_id: Option<&str>) {}
    fn on_ui_action(&self, action: UiAction) {}
    fn on_open_external(&self, url: &Url) {}
    fn on_operation_failed(&self, operation: &str, message: &str) {}
    fn on_sweep_finished(&self, summary: SweepSummary) {}
    fn on_phase(&self, phase: &ShellPhase) {}
    fn on_embed_message(&self, message: &EmbedMessage) {}
}

type ShellQuery = Box<dyn FnOnce(&DesktopShell) + Send>;

enum LoopMessage {
    Input(ShellInput),
    Completed {
        generation: u64,
        completion: RemoteCompletion,
    },
    Query(ShellQuery),
    Shutdown,
}

#[derive(Clone)]
pub struct RuntimeHandle {
    sender: Sender<LoopMessage>,
}

impl RuntimeHandle {
    pub fn send(&self, input: ShellInput) -> Result<(), ShellError> {
        self.sender
            .send(LoopMessage::Input(input))
            .map_err(|_| ShellError::RuntimeStopped)
    }

    /// Decodes a raw message from embedded content and forwards it.
    pub fn deliver_embed_message(&self, raw: &str) -> Result<(), ShellError> {
        let message = decode_embed_message(raw)?;
        self.send(ShellInput::Embed(message))
    }

    /// Runs `read` against the shell on the loop thread and waits for the answer.
    pub fn query<T, F>(&self, read: F) -> Result<T, ShellError>
    where
        T: Send + 'static,
        F: FnOnce(&DesktopShell) -> T + Send + 'static,
    {
        let (reply, answer) = mpsc::channel();
        let query: ShellQuery = Box::new(move |shell| {
            let _ = reply.send(read(shell));
        });
        self.sender
            .send(LoopMessage::Query(query))
            .map_err(|_| ShellError::RuntimeStopped)?;
        answer
            .recv_timeout(RUNTIME_SHUTDOWN_TIMEOUT)
            .map_err(|_| ShellError::RuntimeStopped)
    }
}

impl InputSink for RuntimeHandle {
    fn deliver(&self, input: ShellInput) {
        if self.send(input).is_err() {
            debug!("shell runtime stopped; discarding input");
        }
    }
}

/// Owns the loop thread. Remote calls run on short-lived worker threads and
/// report back through the loop channel; dropping the runtime bumps the
/// generation so late completions are discarded.
pub struct ShellRuntime {
    handle: RuntimeHandle,
    generation: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl ShellRuntime {
    pub fn spawn(
        client: Arc<dyn RegistryClient>,
        shell: DesktopShell,
        observer: Box<dyn ShellObserver>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(1));

        let loop_context = LoopContext {
            client,
            sender: sender.clone(),
            generation: generation.clone(),
            current_generation: generation.load(Ordering::Relaxed),
            observer,
        };
        let thread = thread::spawn(move || run_loop(receiver, shell, loop_context));
        info!("shell runtime started");

        Self {
            handle: RuntimeHandle { sender },
            generation,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.generation.fetch_add(1, Ordering::Relaxed);
        let _ = self.handle.sender.send(LoopMessage::Shutdown);

        let deadline = Instant::now() + RUNTIME_SHUTDOWN_TIMEOUT;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!("shell runtime did not stop in time; detaching loop thread");
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if thread.join().is_err() {
            warn!("shell runtime loop panicked");
        }
        info!("shell runtime stopped");
    }
}

impl Drop for ShellRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    client: Arc<dyn RegistryClient>,
    sender: Sender<LoopMessage>,
    generation: Arc<AtomicU64>,
    current_generation: u64,
    observer: Box<dyn ShellObserver>,
}

fn run_loop(receiver: Receiver<LoopMessage>, mut shell: DesktopShell, context: LoopContext) {
    while let Ok(message) = receiver.recv() {
        let effects = match message {
            LoopMessage::Input(input) => shell.handle(input),
            LoopMessage::Completed {
                generation,
                completion,
            } => {
                if generation != context.generation.load(Ordering::Relaxed) {
                    debug!(request_id = %completion.request_id, "discarding stale completion");
                    continue;
                }
                shell.handle(ShellInput::RemoteCompleted(completion))
            }
            LoopMessage::Query(query) => {
                query(&shell);
                continue;
            }
            LoopMessage::Shutdown => break,
        };

        for effect in effects {
            execute(&context, effect);
        }
    }
    debug!("shell loop exited");
}

fn execute(context: &LoopContext, effect: ShellEffect) {
    let observer = context.observer.as_ref();
    match effect {
        ShellEffect::Remote(request) => spawn_remote_call(context, request),
        ShellEffect::Navigate { route, replace } => observer.on_navigate(&route, replace),
        ShellEffect::PublishActiveProject(project_id) => {
            observer.on_active_project(project_id.as_deref())
        }
        ShellEffect::PostToEmbed(message) => observer.on_embed_message(&message),
        ShellEffect::Present(action) => observer.on_ui_action(action),
        ShellEffect::OpenExternal(url) => observer.on_open_external(&url),
        ShellEffect::OperationFailed { operation, message } => {
            observer.on_operation_failed(operation, &message)
        }
        ShellEffect::ValidationSweepFinished(summary) => observer.on_sweep_finished(summary),
        ShellEffect::PhaseChanged(phase) => observer.on_phase(&phase),
    }
}

fn spawn_remote_call(context: &LoopContext, request: RemoteRequest) {
    let client = context.client.clone();
    let sender = context.sender.clone();
    let generation_counter = context.generation.clone();
    let generation = context.current_generation;

    thread::spawn(move || {
        let span = info_span!(
            "registry_call",
            request_id = %request.request_id,
            command = request.call.command()
        );
        let _entered = span.enter();

        let result = dispatch(client.as_ref(), &request.call);
        if generation_counter.load(Ordering::Relaxed) != generation {
            debug!("runtime torn down; dropping registry response");
            return;
        }
        let completion = request.complete(result);
        if sender
            .send(LoopMessage::Completed {
                generation,
                completion,
            })
            .is_err()
        {
            debug!("shell loop gone; dropping registry response");
        }
    });
}
