//! Final drain of the output pipe after the child exits.
//!
//! Once the exit notification arrives the reader is cancelled, the drainer
//! waits a short grace period for the kernel to hand over whatever the child
//! wrote last, then reads snapshots until the pipe is empty. Drained lines
//! go straight into the output log: no prompt answers and no error checks.

use std::time::Duration;

use rust_pipe::{MergedOutput, ReadOutcome};

use crate::error::ExecError;
use crate::handlers::Handlers;
use crate::pipeline::OutputLog;
use crate::reader::{OutputStreamReader, ReaderBatch};

/// A pipe that supports non-blocking snapshot reads.
pub trait SnapshotRead {
    /// Read whatever is available right now, up to `max` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_snapshot(&self, max: usize) -> rust_pipe::Result<ReadOutcome>;
}

impl SnapshotRead for MergedOutput {
    fn read_snapshot(&self, max: usize) -> rust_pipe::Result<ReadOutcome> {
        self.try_read_available(max)
    }
}

/// Runs the post-exit drain.
#[derive(Debug, Clone, Copy)]
pub struct TerminationDrainer {
    grace_period: Duration,
}

impl TerminationDrainer {
    /// Create a drainer with the given grace period.
    #[must_use]
    pub const fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    /// Get the grace period.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Cancel the reader and move every remaining byte into `log`.
    ///
    /// Returns the number of lines drained.
    pub async fn drain<P: SnapshotRead>(
        &self,
        reader: &mut OutputStreamReader,
        pipe: &P,
        log: &mut OutputLog,
        handlers: &Handlers,
    ) -> usize {
        reader.cancel();
        tokio::time::sleep(self.grace_period).await;

        let before = log.len();
        loop {
            match pipe.read_snapshot(reader.capacity()) {
                Ok(ReadOutcome::Data(bytes)) => {
                    let batch = reader.drain_chunk(&bytes);
                    absorb(batch, log, handlers);
                }
                Ok(ReadOutcome::Empty | ReadOutcome::Eof) => break,
                Err(e) => {
                    handlers.error(ExecError::Pipe(e));
                    break;
                }
            }
        }
        absorb(reader.flush(), log, handlers);

        let drained = log.len() - before;
        tracing::debug!(lines = drained, "output drained");
        drained
    }
}

/// Fold a batch into the log without running the line pipeline.
pub(crate) fn absorb(batch: ReaderBatch, log: &mut OutputLog, handlers: &Handlers) {
    if batch.decode_failed {
        log.mark_error();
    }
    if let Some(error) = batch.decode_error {
        handlers.error(error);
    }
    for line in batch.lines {
        log.push(line);
    }
}
