//! Error types for the rust-pipe crate.
//!
//! This module provides a unified error type [`PipeError`] that covers all
//! failure modes when creating pipes and spawning or signalling children.

use std::io;

/// The error type for pipe and child-process operations.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// Failed to create a pipe.
    #[error("failed to create pipe: {0}")]
    Create(#[source] io::Error),

    /// Failed to spawn a child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred while reading or writing a pipe.
    #[error("pipe I/O error: {0}")]
    Io(#[from] io::Error),

    /// The child process has already exited.
    #[error("child process {pid} has already exited")]
    NotRunning {
        /// The process id that is no longer running.
        pid: u32,
    },

    /// Failed to send a signal to the child process.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to wait for the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

/// A specialized Result type for pipe operations.
pub type Result<T> = std::result::Result<T, PipeError>;

#[cfg(unix)]
impl From<rustix::io::Errno> for PipeError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno.raw_os_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PipeError::NotRunning { pid: 42 };
        assert_eq!(err.to_string(), "child process 42 has already exited");
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let pipe_err: PipeError = io_err.into();
        assert!(matches!(pipe_err, PipeError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn error_from_errno() {
        let err: PipeError = rustix::io::Errno::PIPE.into();
        match err {
            PipeError::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::EPIPE)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
