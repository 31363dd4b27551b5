use super::pass::{run_pass, Identity, PassOutcome};
use super::runner::CommandRunner;
use super::settings::{BackupSettings, SettingsStore};
use super::BackupState;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(4000);
const MANUAL_REASON: &str = "manual";

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub vault_root: PathBuf,
    pub debounce: Duration,
    pub identity: Identity,
}

impl SchedulerOptions {
    pub fn new(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
            debounce: DEFAULT_DEBOUNCE,
            identity: Identity::default(),
        }
    }
}

enum Command {
    Schedule(String),
    Flush {
        reason: Option<String>,
        reply: oneshot::Sender<BackupState>,
    },
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<BackupState>,
    },
}

/// Handle to the backup actor. Cheap to clone; the actor stops when the last
/// handle is dropped (after finishing a pass in flight).
#[derive(Clone)]
pub struct BackupScheduler {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<BackupState>,
}

impl BackupScheduler {
    /// Starts the actor on the current tokio runtime.
    pub fn spawn(
        runner: Arc<dyn CommandRunner>,
        settings: SettingsStore,
        options: SchedulerOptions,
    ) -> Self {
        let initial = BackupState {
            enabled: settings.load().enabled,
            ..BackupState::default()
        };
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(initial.clone());

        let actor = Actor {
            commands: rx,
            status: status_tx,
            state: initial,
            runner,
            settings,
            options,
            reason: None,
            deadline: None,
            in_flight: None,
            manual_owed: false,
            changed_during_pass: false,
        };
        tokio::spawn(actor.run());

        Self { commands, status }
    }

    /// Notes that the vault changed. With backups enabled this (re)starts the
    /// debounce timer; otherwise it only marks the state dirty.
    pub fn schedule(&self, reason: impl Into<String>) {
        let _ = self.commands.send(Command::Schedule(reason.into()));
    }

    /// Runs a pass now (or right after the one in flight) and returns the
    /// state as of its start. Runs even when automatic backups are disabled.
    pub async fn flush(&self, reason: Option<String>) -> BackupState {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Flush { reason, reply }).is_err() {
            return self.status();
        }
        rx.await.unwrap_or_else(|_| self.status())
    }

    /// Persists the flag. Disabling cancels the debounce timer and any rerun
    /// owed to `schedule`; a pass in flight and a rerun owed to `flush` still
    /// complete.
    pub async fn set_enabled(&self, enabled: bool) -> BackupState {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(Command::SetEnabled { enabled, reply })
            .is_err()
        {
            return self.status();
        }
        rx.await.unwrap_or_else(|_| self.status())
    }

    pub fn status(&self) -> BackupState {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BackupState> {
        self.status.clone()
    }
}

enum Event {
    Command(Command),
    Timer,
    PassDone(Result<PassOutcome, JoinError>),
    Closed,
}

struct Actor {
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<BackupState>,
    state: BackupState,
    runner: Arc<dyn CommandRunner>,
    settings: SettingsStore,
    options: SchedulerOptions,
    /// Reason for the next pass; the latest request wins.
    reason: Option<String>,
    deadline: Option<Instant>,
    in_flight: Option<JoinHandle<PassOutcome>>,
    /// The owed rerun was asked for by `flush`, so disabling keeps it.
    manual_owed: bool,
    /// `schedule` arrived while the current pass was running.
    changed_during_pass: bool,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_pass(in_flight: &mut Option<JoinHandle<PassOutcome>>) -> Result<PassOutcome, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::Closed,
                },
                _ = wait_until(self.deadline) => Event::Timer,
                result = wait_pass(&mut self.in_flight) => Event::PassDone(result),
            };

            match event {
                Event::Command(command) => self.handle(command),
                Event::Timer => {
                    self.deadline = None;
                    self.request_pass(false);
                }
                Event::PassDone(result) => self.finish_pass(result),
                Event::Closed => {
                    if let Some(handle) = self.in_flight.take() {
                        let result = handle.await;
                        self.state.pending = false;
                        self.finish_pass(result);
                    }
                    debug!("backup scheduler stopped");
                    return;
                }
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Schedule(reason) => {
                self.state.dirty = true;
                if self.in_flight.is_some() {
                    self.changed_during_pass = true;
                }
                if self.state.enabled {
                    self.state.pending = true;
                    self.reason = Some(reason);
                    self.deadline = Some(Instant::now() + self.options.debounce);
                }
                self.publish();
            }
            Command::Flush { reason, reply } => {
                self.deadline = None;
                if let Some(reason) = reason {
                    self.reason = Some(reason);
                }
                self.request_pass(true);
                let _ = reply.send(self.state.clone());
            }
            Command::SetEnabled { enabled, reply } => {
                if let Err(e) = self.settings.save(&BackupSettings { enabled }) {
                    warn!(error = %e, "cannot persist backup settings");
                    self.state.last_error = Some(format!("cannot save backup settings: {}", e));
                }
                self.state.enabled = enabled;
                if !enabled {
                    // Automatic work is dropped; a rerun owed to `flush` survives.
                    self.deadline = None;
                    if !self.manual_owed {
                        self.state.pending = false;
                        self.reason = None;
                    }
                }
                self.publish();
                let _ = reply.send(self.state.clone());
            }
        }
    }

    /// Starts a pass, or marks one as owed if a pass is already running.
    fn request_pass(&mut self, manual: bool) {
        if self.in_flight.is_some() {
            self.state.pending = true;
            self.manual_owed |= manual;
            self.publish();
            return;
        }
        self.start_pass();
    }

    fn start_pass(&mut self) {
        self.state.pending = false;
        self.deadline = None;
        self.manual_owed = false;
        self.changed_during_pass = false;
        let reason = self
            .reason
            .take()
            .unwrap_or_else(|| MANUAL_REASON.to_string());
        self.state.busy = true;
        self.state.last_reason = Some(reason.clone());
        debug!(reason = %reason, "starting backup pass");

        let runner = Arc::clone(&self.runner);
        let root = self.options.vault_root.clone();
        let identity = self.options.identity.clone();
        self.in_flight = Some(tokio::spawn(async move {
            run_pass(runner.as_ref(), &root, &reason, &identity).await
        }));
        self.publish();
    }

    fn finish_pass(&mut self, result: Result<PassOutcome, JoinError>) {
        self.in_flight = None;
        let outcome = result.unwrap_or_else(|e| PassOutcome::failed(format!("backup task failed: {}", e)));
        if let Some(error) = &outcome.error {
            warn!(error = %error, "backup pass failed");
        }
        self.state.apply(outcome, Utc::now());
        if self.changed_during_pass {
            self.state.dirty = true;
        }

        if self.state.pending {
            self.start_pass();
        } else {
            self.state.busy = false;
            self.publish();
        }
    }

    fn publish(&self) {
        self.status.send_replace(self.state.clone());
    }
}
