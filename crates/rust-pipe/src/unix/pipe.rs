//! Merged stdout/stderr pipe for Unix.
//!
//! The read end is non-blocking and registered with tokio's reactor through
//! [`AsyncFd`]; the write end is handed to the child twice (as stdout and
//! stderr) so both streams arrive interleaved in write order.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use bytes::{Bytes, BytesMut};
use rustix::fs::{OFlags, fcntl_setfl};
use rustix::io::{Errno, FdFlags, fcntl_setfd};
use tokio::io::unix::AsyncFd;

use crate::error::{PipeError, Result};

/// Default snapshot read capacity (64KB).
pub const DEFAULT_READ_CAPACITY: usize = 64 * 1024;

/// Result of a snapshot read from the output pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes that were available at the time of the read.
    Data(Bytes),
    /// Nothing was available, the writer is still open.
    Empty,
    /// Every write end has been closed and the pipe is drained.
    Eof,
}

impl ReadOutcome {
    /// Returns the data, if any was read.
    #[must_use]
    pub const fn data(&self) -> Option<&Bytes> {
        match self {
            Self::Data(bytes) => Some(bytes),
            Self::Empty | Self::Eof => None,
        }
    }
}

/// Read end of a pipe carrying a child's combined stdout and stderr.
pub struct MergedOutput {
    /// The read end wrapped for readiness notifications.
    async_fd: AsyncFd<OwnedFd>,
}

impl std::fmt::Debug for MergedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedOutput")
            .field("fd", &self.async_fd.as_raw_fd())
            .finish()
    }
}

impl MergedOutput {
    /// Create a new pipe, returning the async read end and the raw write end.
    ///
    /// Both descriptors are close-on-exec so they never leak into unrelated
    /// children; the write end must be duplicated onto the child's stdio.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe cannot be created or registered.
    pub fn open() -> Result<(Self, OwnedFd)> {
        let (read_fd, write_fd) = rustix::pipe::pipe().map_err(create_error)?;

        fcntl_setfd(&read_fd, FdFlags::CLOEXEC).map_err(create_error)?;
        fcntl_setfd(&write_fd, FdFlags::CLOEXEC).map_err(create_error)?;

        // Only the parent's end is non-blocking; the child keeps blocking writes.
        fcntl_setfl(&read_fd, OFlags::NONBLOCK).map_err(create_error)?;

        let async_fd = AsyncFd::new(read_fd).map_err(PipeError::Create)?;

        Ok((Self { async_fd }, write_fd))
    }

    /// Take a non-blocking snapshot of the bytes currently in the pipe.
    ///
    /// Reads until the pipe would block, reports end-of-file, or `max` bytes
    /// have been collected.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    pub fn try_read_available(&self, max: usize) -> Result<ReadOutcome> {
        let max = max.max(1);
        let mut buf = BytesMut::zeroed(max);
        let mut filled = 0;
        let mut eof = false;

        while filled < max {
            match rustix::io::read(self.async_fd.get_ref(), &mut buf[filled..]) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(Errno::INTR) => {}
                Err(Errno::AGAIN) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if filled > 0 {
            buf.truncate(filled);
            tracing::trace!(bytes = filled, "pipe snapshot read");
            Ok(ReadOutcome::Data(buf.freeze()))
        } else if eof {
            Ok(ReadOutcome::Eof)
        } else {
            Ok(ReadOutcome::Empty)
        }
    }

    /// Wait for a readiness notification and return the next snapshot.
    ///
    /// Empty snapshots are swallowed and the subscription re-armed, so this
    /// only resolves with data or end-of-file. Cancel safe: bytes are only
    /// consumed inside a single poll.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting for readiness or reading fails.
    pub async fn read_available(&self, max: usize) -> Result<ReadOutcome> {
        loop {
            match self.try_read_available(max)? {
                ReadOutcome::Empty => {}
                outcome => return Ok(outcome),
            }

            let mut guard = self.async_fd.readable().await?;
            guard.clear_ready();
        }
    }
}

impl AsRawFd for MergedOutput {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

fn create_error(errno: Errno) -> PipeError {
    PipeError::Create(io::Error::from_raw_os_error(errno.raw_os_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn writer(fd: OwnedFd) -> std::fs::File {
        std::fs::File::from(fd)
    }

    #[tokio::test]
    async fn empty_pipe_reports_empty() {
        let (output, _write_fd) = MergedOutput::open().unwrap();
        assert_eq!(output.try_read_available(16).unwrap(), ReadOutcome::Empty);
    }

    #[tokio::test]
    async fn read_available_returns_written_bytes() {
        let (output, write_fd) = MergedOutput::open().unwrap();
        let mut file = writer(write_fd);
        file.write_all(b"hello\nworld\n").unwrap();

        let outcome = output.read_available(1024).await.unwrap();
        assert_eq!(outcome.data().map(|b| &b[..]), Some(&b"hello\nworld\n"[..]));
    }

    #[tokio::test]
    async fn snapshot_respects_capacity() {
        let (output, write_fd) = MergedOutput::open().unwrap();
        let mut file = writer(write_fd);
        file.write_all(b"0123456789").unwrap();

        let first = output.try_read_available(4).unwrap();
        assert_eq!(first.data().map(|b| &b[..]), Some(&b"0123"[..]));
        let rest = output.try_read_available(64).unwrap();
        assert_eq!(rest.data().map(|b| &b[..]), Some(&b"456789"[..]));
    }

    #[tokio::test]
    async fn closing_writer_reports_eof_after_data() {
        let (output, write_fd) = MergedOutput::open().unwrap();
        let mut file = writer(write_fd);
        file.write_all(b"last").unwrap();
        drop(file);

        let data = output.read_available(64).await.unwrap();
        assert_eq!(data.data().map(|b| &b[..]), Some(&b"last"[..]));
        assert_eq!(output.read_available(64).await.unwrap(), ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn read_available_wakes_on_later_write() {
        let (output, write_fd) = MergedOutput::open().unwrap();
        let mut file = writer(write_fd);

        let writer_task = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            file.write_all(b"late\n").unwrap();
            file
        });

        let outcome = output.read_available(64).await.unwrap();
        assert_eq!(outcome.data().map(|b| &b[..]), Some(&b"late\n"[..]));
        drop(writer_task.await.unwrap());
    }
}
