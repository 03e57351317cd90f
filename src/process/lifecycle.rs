//! Engine lifecycle control: pause, resume, terminate.
//!
//! [`Lifecycle`] owns the lifecycle state of one engine process, the
//! cancellation tokens of its reader and writer tasks, and signal delivery
//! to the OS process. Termination is split in two halves:
//!
//! - [`Lifecycle::terminate`] is synchronous and idempotent. It cancels the
//!   I/O tasks, sends `SIGTERM`, and wakes the reaper.
//! - The reaper task ([`spawn_reaper`]) owns the [`Child`]. It emits `died`
//!   when nobody else has, waits for the exit (force-killing after the grace
//!   period), joins the I/O tasks, and finally moves the state to `Dead`.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::events::EventBus;
use crate::models::label::TaskLabel;
use crate::models::state::ProcessState;
use crate::{AppError, Result};

/// Platform features the lifecycle controller may rely on.
///
/// Determined once per supervisor instead of at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `SIGTERM`/`SIGSTOP`/`SIGCONT` delivery is available.
    pub job_control: bool,
}

impl Capabilities {
    /// Capabilities of the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            job_control: cfg!(unix),
        }
    }
}

/// Signals the controller delivers to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobSignal {
    Terminate,
    Stop,
    Continue,
}

/// Lifecycle controller for one engine process.
#[derive(Debug)]
pub struct Lifecycle {
    label: TaskLabel,
    pid: u32,
    capabilities: Capabilities,
    state: watch::Sender<ProcessState>,
    reader_cancel: CancellationToken,
    writer_cancel: CancellationToken,
    /// Fired once by the first `terminate`; wakes the reaper.
    shutdown: CancellationToken,
}

impl Lifecycle {
    /// Controller for process `pid`, starting in [`ProcessState::Starting`].
    #[must_use]
    pub fn new(label: TaskLabel, pid: u32, capabilities: Capabilities) -> Self {
        let (state, _) = watch::channel(ProcessState::Starting);
        Self {
            label,
            pid,
            capabilities,
            state,
            reader_cancel: CancellationToken::new(),
            writer_cancel: CancellationToken::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.subscribe()
    }

    /// Platform capabilities in effect.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Token cancelling the reader task.
    #[must_use]
    pub fn reader_token(&self) -> CancellationToken {
        self.reader_cancel.clone()
    }

    /// Token cancelling the writer task.
    #[must_use]
    pub fn writer_token(&self) -> CancellationToken {
        self.writer_cancel.clone()
    }

    /// Record that launch completed and the I/O tasks are attached.
    pub fn mark_running(&self) {
        if self.transition(ProcessState::Running).is_none() {
            debug!(task = %self.label, state = %self.state(), "mark_running: engine already stopping");
        }
    }

    /// Stop the engine. Idempotent and non-blocking.
    ///
    /// Cancels the writer and reader tasks, then sends `SIGTERM`. A paused
    /// engine also gets `SIGCONT` so the termination signal is acted on.
    /// An engine that is already gone is logged, not reported. Calls after
    /// the first only repeat the (already done) task cancellation.
    pub fn terminate(&self) {
        self.writer_cancel.cancel();
        self.reader_cancel.cancel();

        let Some(previous) = self.transition(ProcessState::Terminating) else {
            debug!(task = %self.label, state = %self.state(), "terminate: already stopping");
            return;
        };

        info!(task = %self.label, pid = self.pid, "terminating engine");

        if self.capabilities.job_control {
            match self.signal(JobSignal::Terminate) {
                Ok(()) => {}
                Err(e @ AppError::TerminationRace(_)) => {
                    debug!(task = %self.label, error = %e, "terminate: engine already exited");
                }
                Err(e) => {
                    warn!(task = %self.label, error = %e, "terminate: failed to signal engine");
                }
            }

            if previous == ProcessState::Paused {
                if let Err(e) = self.signal(JobSignal::Continue) {
                    debug!(task = %self.label, error = %e, "terminate: failed to continue paused engine");
                }
            }
        }

        self.shutdown.cancel();
    }

    /// Freeze the engine with `SIGSTOP`.
    ///
    /// No-op when the platform lacks job control or the engine is not
    /// running. Signal failures are logged.
    pub fn pause(&self) {
        if !self.capabilities.job_control {
            debug!(task = %self.label, "pause: not supported on this platform");
            return;
        }

        if self.state() != ProcessState::Running {
            debug!(task = %self.label, state = %self.state(), "pause: engine not running, ignoring");
            return;
        }

        match self.signal(JobSignal::Stop) {
            Ok(()) => {
                if self.transition(ProcessState::Paused).is_some() {
                    info!(task = %self.label, "engine paused");
                } else {
                    // terminate() ran after the state check and saw Running,
                    // so it sent no SIGCONT of its own.
                    debug!(task = %self.label, state = %self.state(), "pause: engine stopping, continuing it");
                    if let Err(e) = self.signal(JobSignal::Continue) {
                        debug!(task = %self.label, error = %e, "pause: failed to continue engine");
                    }
                }
            }
            Err(e) => warn!(task = %self.label, error = %e, "pause: failed to stop engine"),
        }
    }

    /// Continue an engine frozen by [`pause`](Self::pause) with `SIGCONT`.
    ///
    /// Same platform and state caveats as `pause`.
    pub fn resume(&self) {
        if !self.capabilities.job_control {
            debug!(task = %self.label, "resume: not supported on this platform");
            return;
        }

        if self.state() != ProcessState::Paused {
            debug!(task = %self.label, state = %self.state(), "resume: engine not paused, ignoring");
            return;
        }

        match self.signal(JobSignal::Continue) {
            Ok(()) => {
                if self.transition(ProcessState::Running).is_some() {
                    info!(task = %self.label, "engine resumed");
                }
            }
            Err(e) => warn!(task = %self.label, error = %e, "resume: failed to continue engine"),
        }
    }

    /// Suspend until the state reaches [`ProcessState::Dead`].
    pub async fn wait_dead(&self) {
        let mut rx = self.state.subscribe();
        if rx
            .wait_for(|state| *state == ProcessState::Dead)
            .await
            .is_err()
        {
            debug!(task = %self.label, "wait_dead: state channel closed");
        }
    }

    /// Apply `next` if permitted, returning the state it replaced.
    fn transition(&self, next: ProcessState) -> Option<ProcessState> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                previous = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });
        previous
    }

    #[cfg(unix)]
    fn signal(&self, signal: JobSignal) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let sig = match signal {
            JobSignal::Terminate => Signal::SIGTERM,
            JobSignal::Stop => Signal::SIGSTOP,
            JobSignal::Continue => Signal::SIGCONT,
        };
        let raw = i32::try_from(self.pid)
            .map_err(|_| AppError::Signal(format!("pid {} out of range", self.pid)))?;

        match kill(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(AppError::TerminationRace(format!(
                "process {} not found",
                self.pid
            ))),
            Err(errno) => Err(AppError::Signal(format!(
                "{sig:?} to process {} failed: {errno}",
                self.pid
            ))),
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, signal: JobSignal) -> Result<()> {
        Err(AppError::Signal(format!(
            "{signal:?} not supported on this platform"
        )))
    }
}

// ── Reaper ───────────────────────────────────────────────────────────────────

/// Spawn the task that finalizes the engine once termination is requested.
///
/// The task sleeps until the first [`Lifecycle::terminate`] call, then:
/// 1. emits `died` on `bus` (a no-op when an I/O task already did);
/// 2. on platforms without job control, requests the kill itself;
/// 3. waits up to `grace` for the exit, force-killing on timeout;
/// 4. joins `io_tasks`;
/// 5. moves the state to [`ProcessState::Dead`].
#[must_use]
pub fn spawn_reaper(
    lifecycle: Arc<Lifecycle>,
    mut child: Child,
    bus: Arc<EventBus>,
    io_tasks: Vec<JoinHandle<()>>,
    grace: Duration,
) -> JoinHandle<()> {
    let span = info_span!("engine_reaper", task = %lifecycle.label);

    tokio::spawn(
        async move {
            lifecycle.shutdown.cancelled().await;

            bus.emit_died();

            if !lifecycle.capabilities.job_control {
                if let Err(err) = child.start_kill() {
                    debug!(%err, "reaper: engine already exited");
                }
            }

            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(pid = lifecycle.pid, %status, "engine exited");
                }
                Ok(Err(err)) => {
                    warn!(pid = lifecycle.pid, %err, "reaper: error waiting for engine");
                }
                Err(_) => {
                    warn!(
                        pid = lifecycle.pid,
                        grace = ?grace,
                        "engine did not exit within grace period, forcing kill"
                    );
                    if let Err(err) = child.kill().await {
                        warn!(pid = lifecycle.pid, %err, "reaper: failed to force-kill engine");
                    }
                }
            }

            for task in io_tasks {
                if let Err(err) = task.await {
                    warn!(%err, "reaper: engine io task failed to join");
                }
            }

            if lifecycle.transition(ProcessState::Dead).is_some() {
                info!(pid = lifecycle.pid, "engine dead");
            }
        }
        .instrument(span),
    )
}
