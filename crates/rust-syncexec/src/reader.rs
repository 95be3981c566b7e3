//! Output stream reader state.
//!
//! The reader turns snapshot reads of the merged output pipe into lines for
//! the line pipeline. It holds no I/O itself: the executor's driver task owns
//! the pipe and feeds chunks in, which keeps cancellation a plain state
//! change that can be checked before every callback.

use crate::config::LineBuffering;
use crate::decode::LineDecoder;
use crate::error::ExecError;

/// Lifecycle of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Accepting chunks.
    Active,
    /// The pipe reported end-of-file.
    Finished,
    /// Stopped by the drain or teardown; emits nothing further.
    Cancelled,
}

/// What one chunk produced.
#[derive(Debug, Default)]
pub struct ReaderBatch {
    /// Lines to feed through the line pipeline.
    pub lines: Vec<String>,
    /// Decode failure to report; only the first failure of a run is kept.
    pub decode_error: Option<ExecError>,
    /// Whether this chunk contained undecodable bytes at all.
    pub decode_failed: bool,
}

/// Readiness-driven reader of the child's merged output.
#[derive(Debug)]
pub struct OutputStreamReader {
    decoder: LineDecoder,
    state: ReaderState,
    decode_failure_reported: bool,
    capacity: usize,
}

impl OutputStreamReader {
    /// Create an active reader.
    #[must_use]
    pub fn new(buffering: LineBuffering, capacity: usize) -> Self {
        Self {
            decoder: LineDecoder::new(buffering),
            state: ReaderState::Active,
            decode_failure_reported: false,
            capacity: capacity.max(1),
        }
    }

    /// Maximum bytes per snapshot read.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the current state.
    #[must_use]
    pub const fn state(&self) -> ReaderState {
        self.state
    }

    /// Check whether the reader still wants readiness notifications.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ReaderState::Active
    }

    /// The unterminated line the decoder is holding back, if any.
    ///
    /// Always empty in [`LineBuffering::Immediate`] mode.
    #[must_use]
    pub fn pending_line(&self) -> &str {
        self.decoder.partial_line()
    }

    /// Stop the reader. Returns `true` only for the call that cancelled it.
    pub fn cancel(&mut self) -> bool {
        if self.state == ReaderState::Cancelled {
            return false;
        }
        self.state = ReaderState::Cancelled;
        tracing::trace!("output reader cancelled");
        true
    }

    /// Record end-of-file on the pipe.
    pub fn finish(&mut self) {
        if self.state == ReaderState::Active {
            self.state = ReaderState::Finished;
        }
    }

    /// Decode a chunk delivered by a readiness notification.
    ///
    /// A cancelled reader returns an empty batch.
    pub fn accept(&mut self, chunk: &[u8]) -> ReaderBatch {
        if self.state == ReaderState::Cancelled {
            return ReaderBatch::default();
        }
        tracing::trace!(bytes = chunk.len(), "output chunk");
        let decoded = self.decoder.decode(chunk);
        self.batch(decoded.lines, decoded.error)
    }

    /// Decode a chunk read during the drain.
    ///
    /// Works after cancellation; the lines go straight to the output log.
    pub fn drain_chunk(&mut self, chunk: &[u8]) -> ReaderBatch {
        let decoded = self.decoder.decode(chunk);
        self.batch(decoded.lines, decoded.error)
    }

    /// Flush anything the decoder is holding back.
    pub fn flush(&mut self) -> ReaderBatch {
        let decoded = self.decoder.finish();
        self.batch(decoded.lines, decoded.error)
    }

    fn batch(&mut self, lines: Vec<String>, error: Option<ExecError>) -> ReaderBatch {
        let decode_failed = error.is_some();
        let decode_error = if decode_failed && !self.decode_failure_reported {
            self.decode_failure_reported = true;
            error
        } else {
            None
        };
        if decode_failed {
            tracing::warn!("child output contained invalid UTF-8");
        }

        ReaderBatch {
            lines,
            decode_error,
            decode_failed,
        }
    }
}
