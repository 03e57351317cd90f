//! Engine stdin writer task.
//!
//! Receives outbound lines from a tokio [`mpsc`] channel and writes each one
//! to the engine's stdin through a [`FramedWrite`] over [`EngineLineCodec`].
//! Every send flushes before the next message is taken, so the channel is
//! drained strictly in order and a slow engine throttles the writer at the
//! flush.
//!
//! Any write failure (broken pipe, connection reset, or otherwise) is fatal:
//! the task emits `died` and stops. Failures are never retried.

use std::io::ErrorKind;
use std::sync::Arc;

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::EventBus;
use crate::models::label::TaskLabel;
use crate::process::codec::EngineLineCodec;
use crate::AppError;

/// How a writer task ended.
#[derive(Debug)]
pub enum WriteExit {
    /// Write or flush failed; `died` was emitted.
    Failed(AppError),
    /// Cancellation token fired; nothing was emitted.
    Cancelled,
    /// Every sender was dropped.
    Closed,
}

impl WriteExit {
    /// Whether this exit was the writer detecting the engine's death.
    #[must_use]
    pub fn is_death(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Engine writer task: writes queued lines to `stdin` one at a time.
///
/// Each line is written verbatim (the caller supplies any line terminator)
/// and flushed before the next one is dequeued.
///
/// The task exits when:
/// - `cancel` fires, including while a write is blocked on a full pipe;
/// - `line_rx` is closed (all senders dropped);
/// - a write fails, after emitting `died` on `bus`.
///
/// The caller is responsible for initiating termination after a failure.
pub async fn run_writer<W>(
    label: TaskLabel,
    stdin: W,
    mut line_rx: mpsc::UnboundedReceiver<String>,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
) -> WriteExit
where
    W: AsyncWrite + Unpin + Send,
{
    let mut sink = FramedWrite::new(stdin, EngineLineCodec::new());

    loop {
        let line = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(task = %label, "engine writer: cancellation received, stopping");
                return WriteExit::Cancelled;
            }

            msg = line_rx.recv() => match msg {
                Some(line) => line,
                None => {
                    debug!(task = %label, "engine writer: line channel closed, stopping");
                    return WriteExit::Closed;
                }
            },
        };

        debug!(task = %label, line = line.trim_end(), "engine input");

        let sent = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(task = %label, "engine writer: cancelled during drain, stopping");
                return WriteExit::Cancelled;
            }

            sent = sink.send(line) => sent,
        };

        if let Err(e) = sent {
            let reason = match e.kind() {
                ErrorKind::BrokenPipe => "broken pipe",
                ErrorKind::ConnectionReset => "connection reset",
                _ => "io error",
            };
            debug!(task = %label, reason, error = %e, "engine writer: write to stdin failed");
            bus.emit_died();
            return WriteExit::Failed(AppError::Write(format!("{reason}: {e}")));
        }
    }
}
