//! Engine stdout reader task.
//!
//! Reads newline-delimited lines from the engine's stdout, filters out the
//! lines engines use as padding or cannot encode reliably, and publishes the
//! rest on the [`EventBus`] in arrival order.
//!
//! The reader is driven by [`FramedRead`] backed by [`EngineLineCodec`],
//! which enforces the per-line length limit before any text decoding.
//!
//! # Filtering
//!
//! | Raw line                         | Outcome                          |
//! |----------------------------------|----------------------------------|
//! | empty / whitespace only          | Skipped silently                 |
//! | starts with `id author`          | Skipped before UTF-8 decoding    |
//! | invalid UTF-8                    | Read failure: `died`, stop       |
//! | anything else                    | Trailing whitespace trimmed, emitted |

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::EventBus;
use crate::models::label::TaskLabel;
use crate::models::warn_words::WarnWords;
use crate::process::codec::EngineLineCodec;
use crate::{AppError, Result};

/// Prefix of the author-identification line.
///
/// Some engines send author names in a legacy single-byte encoding, so the
/// line is dropped on its raw bytes rather than decoded.
pub const AUTHOR_LINE_PREFIX: &[u8] = b"id author";

/// How a reader task ended.
#[derive(Debug)]
pub enum ReadExit {
    /// Stdout reached EOF; `died` was emitted.
    Eof,
    /// Decode or I/O failure; `died` was emitted.
    Failed(AppError),
    /// Cancellation token fired; nothing was emitted.
    Cancelled,
    /// Another detector already emitted `died`; the reader stopped quietly.
    AlreadyDead,
}

impl ReadExit {
    /// Whether this exit was the reader detecting the engine's death.
    #[must_use]
    pub fn is_death(&self) -> bool {
        matches!(self, Self::Eof | Self::Failed(_))
    }

    /// Whether the engine must be terminated after this exit.
    ///
    /// True for a death the reader detected and for a reader that stopped
    /// because the bus was already dead, since nobody drains stdout anymore.
    #[must_use]
    pub fn requires_termination(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Turn one raw stdout line into the text to publish.
///
/// # Return value
///
/// - `Ok(Some(text))`: publishable line, trailing whitespace removed.
/// - `Ok(None)`: empty/whitespace line or author-identification line.
///
/// # Errors
///
/// - [`AppError::Read`]`("invalid utf-8: …")`: the line is not valid UTF-8.
pub fn filter_line(raw: &[u8]) -> Result<Option<String>> {
    if raw.starts_with(AUTHOR_LINE_PREFIX) {
        return Ok(None);
    }

    let text =
        std::str::from_utf8(raw).map_err(|e| AppError::Read(format!("invalid utf-8: {e}")))?;
    let text = text.trim_end();

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_owned()))
    }
}

/// Engine reader task: reads stdout lines and publishes them on `bus`.
///
/// Each frame decoded by `codec` goes through [`filter_line`]; survivors are
/// logged at `WARN` when they contain one of `warn_words` and at `DEBUG`
/// otherwise, then emitted unchanged. The task yields to the scheduler after
/// every frame so a chatty engine cannot starve other tasks.
///
/// On EOF or a read failure the task emits `died` exactly once and returns;
/// the caller is responsible for initiating termination.
///
/// # Cancellation
///
/// Respects `cancel`: when the token fires the reader stops without
/// emitting anything, even while suspended in a read.
pub async fn run_reader<R>(
    label: TaskLabel,
    stdout: R,
    codec: EngineLineCodec,
    warn_words: WarnWords,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
) -> ReadExit
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, codec);

    loop {
        let frame = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(task = %label, "engine reader: cancellation received, stopping");
                return ReadExit::Cancelled;
            }

            frame = framed.next() => frame,
        };

        let raw = match frame {
            None => {
                debug!(task = %label, "engine reader: EOF detected");
                bus.emit_died();
                return ReadExit::Eof;
            }
            Some(Err(e)) => {
                warn!(task = %label, error = %e, "engine reader: stream error, stopping");
                bus.emit_died();
                return ReadExit::Failed(AppError::Read(format!("stream error: {e}")));
            }
            Some(Ok(raw)) => raw,
        };

        match filter_line(&raw) {
            Ok(Some(line)) => {
                if let Some(word) = warn_words.matching(&line) {
                    warn!(task = %label, warn_word = word, line = %line, "engine output");
                } else {
                    debug!(task = %label, line = %line, "engine output");
                }

                if !bus.emit_line(&line) {
                    debug!(task = %label, "engine reader: died already emitted, stopping");
                    return ReadExit::AlreadyDead;
                }
            }
            Ok(None) => {
                // Empty or author line, silently skipped.
            }
            Err(e) => {
                warn!(task = %label, error = %e, "engine reader: undecodable line, stopping");
                bus.emit_died();
                return ReadExit::Failed(e);
            }
        }

        tokio::task::yield_now().await;
    }
}
