//! Line framing for engine stdio streams.
//!
//! Engines speak a plain newline-delimited text protocol, but not every
//! engine keeps every line valid UTF-8. The decoder therefore yields raw
//! byte lines and leaves text decoding to the reader, which can drop known
//! unreliable lines before decoding them.
//!
//! # Usage
//!
//! Use [`EngineLineCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] (stdout) and
//! [`tokio_util::codec::FramedWrite`] (stdin).

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};
use tracing::warn;

use crate::{AppError, Result};

/// Default maximum line length accepted by the decoder: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited byte codec for engine stdio.
///
/// # Decoder
///
/// Yields each `\n`-terminated line without the separator, as raw bytes.
/// A final unterminated fragment is yielded at EOF. Lines longer than the
/// configured maximum are discarded up to the next separator and a warning
/// is logged; decoding then continues normally.
///
/// # Encoder
///
/// Writes the given string's UTF-8 bytes verbatim. No separator is added:
/// callers own the protocol's line endings.
#[derive(Debug, Clone)]
pub struct EngineLineCodec {
    inner: AnyDelimiterCodec,
}

impl EngineLineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec that discards lines longer than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_length),
        }
    }

    /// Configured maximum line length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.inner.max_length()
    }

    fn discard_oversized(&self) {
        warn!(
            max_length = self.max_length(),
            "engine codec: line too long, discarding until next separator"
        );
    }
}

impl Default for EngineLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EngineLineCodec {
    type Item = Bytes;
    type Error = AppError;

    // An oversized line leaves the inner codec discarding; retrying drops the
    // rest of it, so `FramedRead` never sees the length error.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode(src) {
                Ok(line) => return Ok(line),
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => self.discard_oversized(),
                Err(AnyDelimiterCodecError::Io(err)) => return Err(err.into()),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode_eof(src) {
                Ok(line) => return Ok(line),
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => self.discard_oversized(),
                Err(AnyDelimiterCodecError::Io(err)) => return Err(err.into()),
            }
        }
    }
}

impl Encoder<String> for EngineLineCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> std::io::Result<()> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
