//! The write side of a child's stdin.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::LineEnding;
use crate::error::{ExecError, Result};

/// Owns the child's stdin and refuses writes once the child is gone.
#[derive(Debug)]
pub struct StdinChannel<W> {
    /// The writer; `None` once closed.
    writer: Option<W>,
    /// Cleared when the child has been observed to exit.
    child_alive: bool,
    /// Terminator appended to every line.
    line_ending: LineEnding,
}

impl<W: AsyncWrite + Unpin> StdinChannel<W> {
    /// Wrap a writer connected to a live child.
    pub const fn new(writer: W, line_ending: LineEnding) -> Self {
        Self {
            writer: Some(writer),
            child_alive: true,
            line_ending,
        }
    }

    /// Check whether a write would reach the child.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.child_alive && self.writer.is_some()
    }

    /// Check whether the channel has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Record that the child has exited; later writes are skipped.
    pub const fn mark_child_exited(&mut self) {
        self.child_alive = false;
    }

    /// Write `text` followed by the line ending.
    ///
    /// Returns `Ok(false)` when the write was skipped because the child has
    /// exited, stdin is closed, or the child closed its end of the pipe.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::IoWithContext`] if the write fails for any other
    /// reason.
    pub async fn send_line(&mut self, text: &str) -> Result<bool> {
        if !self.child_alive {
            tracing::debug!("child has exited, skipping stdin write");
            return Ok(false);
        }
        let Some(writer) = self.writer.as_mut() else {
            tracing::debug!("stdin closed, skipping write");
            return Ok(false);
        };

        let mut data = String::with_capacity(text.len() + 2);
        data.push_str(text);
        data.push_str(self.line_ending.as_str());

        let written = async {
            writer.write_all(data.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!("child closed stdin");
                self.writer = None;
                Ok(false)
            }
            Err(e) => Err(ExecError::io_context("writing to child stdin", e)),
        }
    }

    /// Shut down and drop the writer so the child sees end-of-file.
    ///
    /// Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "stdin shutdown failed");
            }
        }
    }
}
