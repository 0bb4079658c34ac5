//! Debounced autosave with a single-flight save gate.
//!
//! ```text
//! Idle ──dirty──▶ Scheduled ──timer──▶ Saving ──▶ Idle
//!                  │    ▲
//!                  └────┘ dirty re-arms the timer
//! ```
//!
//! The scheduler task owns the timer. Saves, whether fired by the timer or
//! requested through [`AutosaveHandle::save_now`], go through one async
//! mutex so two saves never overlap. A save clears the dirty flag only when
//! the project was not edited while it was being written.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::NotationError;
use crate::project::ProjectSink;
use crate::session::ScoringSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveState {
    Idle,
    Scheduled,
    Saving,
}

#[derive(Debug)]
enum AutosaveCommand {
    Dirty,
    Shutdown,
}

/// Cloneable "the project changed" notifier held by the session.
#[derive(Debug, Clone)]
pub struct DirtySignal {
    tx: mpsc::UnboundedSender<AutosaveCommand>,
}

impl DirtySignal {
    pub fn notify(&self) {
        // Fails only after shutdown.
        let _ = self.tx.send(AutosaveCommand::Dirty);
    }
}

struct Autosaver<S: ProjectSink> {
    session: Arc<Mutex<ScoringSession>>,
    sink: Arc<S>,
    ceiling: Duration,
    gate: tokio::sync::Mutex<()>,
    state: Mutex<AutosaveState>,
}

impl<S: ProjectSink> Autosaver<S> {
    fn set_state(&self, state: AutosaveState) -> AutosaveState {
        std::mem::replace(&mut *self.state.lock().unwrap(), state)
    }

    fn delay(&self) -> Option<Duration> {
        self.session.lock().unwrap().project().autosave_delay(self.ceiling)
    }

    /// Save under the gate. Without `force`, a clean project is skipped.
    /// Afterwards the state becomes `settle`, or returns to what it was
    /// when `settle` is `None`. Returns whether anything was written.
    async fn save(&self, force: bool, settle: Option<AutosaveState>) -> Result<bool, NotationError> {
        let _flight = self.gate.lock().await;
        let previous = self.set_state(AutosaveState::Saving);
        let result = self.write(force).await;
        let mut state = self.state.lock().unwrap();
        if *state == AutosaveState::Saving {
            *state = settle.unwrap_or(previous);
        }
        result
    }

    async fn write(&self, force: bool) -> Result<bool, NotationError> {
        let (path, data, generation) = {
            let session = self.session.lock().unwrap();
            if !force && !session.project().is_dirty() {
                return Ok(false);
            }
            let path = session.project().file_path().ok_or(NotationError::NoDestination)?;
            let data = session.project_data().ok_or(NotationError::NoDestination)?;
            (path, data, session.project().generation())
        };

        self.sink.save(&path, &data).await?;

        self.session.lock().unwrap().mark_clean_if(generation);
        Ok(true)
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<AutosaveCommand>) {
        let mut deadline: Option<Instant> = None;
        loop {
            let wake = match deadline {
                Some(at) => tokio::select! {
                    command = rx.recv() => Wake::Command(command),
                    _ = tokio::time::sleep_until(at) => Wake::Timer,
                },
                None => Wake::Command(rx.recv().await),
            };

            match wake {
                Wake::Timer => {
                    deadline = None;
                    match self.save(false, Some(AutosaveState::Idle)).await {
                        Ok(_) => {}
                        Err(NotationError::NoDestination) => debug!("Autosave skipped: no destination yet"),
                        Err(e) => warn!("Failed to autosave project: {}", e),
                    }
                }
                Wake::Command(Some(AutosaveCommand::Dirty)) => match self.delay() {
                    Some(delay) => {
                        deadline = Some(Instant::now() + delay);
                        self.set_state(AutosaveState::Scheduled);
                    }
                    None => debug!("Autosave disabled, ignoring dirty signal"),
                },
                Wake::Command(Some(AutosaveCommand::Shutdown)) | Wake::Command(None) => {
                    self.set_state(AutosaveState::Idle);
                    debug!("Autosave scheduler stopped");
                    break;
                }
            }
        }
    }
}

enum Wake {
    Command(Option<AutosaveCommand>),
    Timer,
}

/// Starts the scheduler task.
pub struct AutosaveScheduler;

impl AutosaveScheduler {
    /// Spawn the scheduler on the current Tokio runtime and install its
    /// dirty signal in `session`. The debounce ceiling comes from the
    /// session's config.
    pub fn spawn<S: ProjectSink>(session: Arc<Mutex<ScoringSession>>, sink: Arc<S>) -> AutosaveHandle<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let signal = DirtySignal { tx: tx.clone() };
        let ceiling = {
            let mut guard = session.lock().unwrap();
            guard.set_dirty_signal(signal.clone());
            guard.config().debounce_ceiling()
        };

        let inner = Arc::new(Autosaver {
            session,
            sink,
            ceiling,
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(AutosaveState::Idle),
        });
        let task = tokio::spawn(inner.clone().run(rx));
        AutosaveHandle { inner, tx, signal, task }
    }
}

pub struct AutosaveHandle<S: ProjectSink> {
    inner: Arc<Autosaver<S>>,
    tx: mpsc::UnboundedSender<AutosaveCommand>,
    signal: DirtySignal,
    task: JoinHandle<()>,
}

impl<S: ProjectSink> AutosaveHandle<S> {
    pub fn signal(&self) -> DirtySignal {
        self.signal.clone()
    }

    pub fn state(&self) -> AutosaveState {
        *self.inner.state.lock().unwrap()
    }

    /// Save immediately, waiting for any save in flight. Saves even a clean
    /// project. Fails with [`NotationError::NoDestination`] when the project
    /// has never been saved to a path.
    pub async fn save_now(&self) -> Result<(), NotationError> {
        self.inner.save(true, None).await.map(|_| ())
    }

    /// Cancel any armed timer and wait for the task to stop. A save in
    /// flight completes first.
    pub async fn shutdown(self) {
        let _ = self.tx.send(AutosaveCommand::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Autosave task ended abnormally: {}", e);
        }
    }
}
