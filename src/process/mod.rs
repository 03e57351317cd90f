//! Engine process supervision.
//!
//! A [`Supervisor`] owns exactly one engine process and the tasks attached
//! to its stdio:
//! - `spawner`: process launch with piped stdin/stdout.
//! - `codec`: newline framing over raw bytes.
//! - `reader`: stdout task publishing filtered lines; EOF means death.
//! - `writer`: stdin task draining queued lines in order; a failed write
//!   means death.
//! - `lifecycle`: pause/resume/terminate and the reaper that finalizes the
//!   process.
//!
//! Collaborators observe the engine only through the [`EventBus`] passed at
//! launch: any number of `line` notifications followed by exactly one
//! `died`.

pub mod codec;
pub mod lifecycle;
pub mod reader;
pub mod spawner;
pub mod writer;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info_span, Instrument};

use crate::config::SupervisorConfig;
use crate::events::EventBus;
use crate::models::label::TaskLabel;
use crate::models::state::ProcessState;
use crate::models::warn_words::WarnWords;
use crate::{AppError, Result};

use self::codec::EngineLineCodec;
use self::lifecycle::{spawn_reaper, Capabilities, Lifecycle};
use self::spawner::LaunchedProcess;

/// Supervisor of one line-oriented engine process.
///
/// Dropping the supervisor terminates the engine.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    label: TaskLabel,
    pid: u32,
    bus: Arc<EventBus>,
    lifecycle: Arc<Lifecycle>,
    line_tx: mpsc::UnboundedSender<String>,
}

impl Supervisor {
    /// Launch the engine described by `config` and attach its I/O tasks.
    ///
    /// Listeners should be registered on `bus` before calling this so no
    /// early output is missed. A bus carries one engine lifetime: relaunching
    /// needs a fresh bus. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `AppError::Config`: `config` fails validation, or `bus` already
    ///   delivered `died` for an earlier engine.
    /// - `AppError::Launch`: the engine could not be started. No process
    ///   exists and nothing is emitted on `bus`.
    pub fn launch(config: SupervisorConfig, bus: Arc<EventBus>) -> Result<Self> {
        if bus.has_died() {
            return Err(AppError::Config(
                "event bus already delivered died; use a new bus for each launch".into(),
            ));
        }

        let LaunchedProcess {
            label,
            pid,
            child,
            stdin,
            stdout,
        } = spawner::launch(&config)?;

        let lifecycle = Arc::new(Lifecycle::new(label.clone(), pid, Capabilities::detect()));
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        lifecycle.mark_running();

        let reader_task = {
            let lifecycle = Arc::clone(&lifecycle);
            let read = reader::run_reader(
                label.clone(),
                stdout,
                EngineLineCodec::with_max_length(config.max_line_bytes),
                WarnWords::new(config.warn_words.iter().cloned()),
                Arc::clone(&bus),
                lifecycle.reader_token(),
            );
            tokio::spawn(
                async move {
                    let exit = read.await;
                    debug!(?exit, "engine reader finished");
                    if exit.requires_termination() {
                        lifecycle.terminate();
                    }
                }
                .instrument(info_span!("engine_reader", task = %label)),
            )
        };

        let writer_task = {
            let lifecycle = Arc::clone(&lifecycle);
            let write = writer::run_writer(
                label.clone(),
                stdin,
                line_rx,
                Arc::clone(&bus),
                lifecycle.writer_token(),
            );
            tokio::spawn(
                async move {
                    let exit = write.await;
                    debug!(?exit, "engine writer finished");
                    if exit.is_death() {
                        lifecycle.terminate();
                    }
                }
                .instrument(info_span!("engine_writer", task = %label)),
            )
        };

        // Detached: the reaper finishes on its own once terminate() runs.
        drop(spawn_reaper(
            Arc::clone(&lifecycle),
            child,
            Arc::clone(&bus),
            vec![reader_task, writer_task],
            config.kill_grace,
        ));

        Ok(Self {
            config,
            label,
            pid,
            bus,
            lifecycle,
            line_tx,
        })
    }

    /// Queue `line` for the engine's stdin. Returns immediately.
    ///
    /// Bytes are written verbatim, so include the protocol's line ending.
    /// Lines are written in call order, each flushed before the next. Lines
    /// queued after the engine died are dropped.
    pub fn write(&self, line: impl Into<String>) {
        if self.line_tx.send(line.into()).is_err() {
            debug!(task = %self.label, "write: engine writer gone, dropping line");
        }
    }

    /// Stop the engine. Idempotent; never fails.
    pub fn terminate(&self) {
        self.lifecycle.terminate();
    }

    /// Freeze the engine (`SIGSTOP`). No-op without job control.
    pub fn pause(&self) {
        self.lifecycle.pause();
    }

    /// Continue a paused engine (`SIGCONT`). No-op without job control.
    pub fn resume(&self) {
        self.lifecycle.resume();
    }

    /// Suspend until the engine has exited and every task is joined.
    pub async fn wait(&self) {
        self.lifecycle.wait_dead().await;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.lifecycle.state()
    }

    /// Receiver observing lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ProcessState> {
        self.lifecycle.subscribe()
    }

    /// Event bus this supervisor publishes on.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// OS process id of the engine.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Log label of this instance.
    #[must_use]
    pub fn label(&self) -> &TaskLabel {
        &self.label
    }

    /// Configuration the engine was launched with.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.lifecycle.terminate();
    }
}
