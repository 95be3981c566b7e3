//! Error types for rust-syncexec.
//!
//! Pre-launch failures are returned from
//! [`CommandExecutor::execute_process`](crate::CommandExecutor::execute_process);
//! everything that happens after launch is delivered to the `on_error`
//! handler instead.

use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of bytes of an offending line shown in error messages.
const MAX_LINE_DISPLAY: usize = 200;

/// Shorten a line for display, keeping it on a char boundary.
fn format_line_snippet(line: &str) -> String {
    if line.len() <= MAX_LINE_DISPLAY {
        return line.to_string();
    }

    let mut end = MAX_LINE_DISPLAY;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &line[..end], line.len())
}

/// The main error type for rust-syncexec operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The invocation has no command path or an empty argument list.
    #[error("command path and at least one argument are required")]
    MissingCommandOrArguments,

    /// The command path does not name a runnable executable.
    #[error("invalid executable path {}: {reason}", path.display())]
    InvalidExecutablePath {
        /// The path as given or as resolved.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// An argument cannot be passed to a child process.
    #[error("invalid argument[{index}]: {reason}")]
    InvalidArgument {
        /// Position of the argument.
        index: usize,
        /// Why the argument was rejected.
        reason: String,
    },

    /// The child process could not be started.
    #[error("failed to launch process: {0}")]
    ProcessLaunchFailed(#[source] rust_pipe::PipeError),

    /// Reading the output pipe or waiting for the child failed.
    #[error("process I/O error: {0}")]
    Pipe(#[from] rust_pipe::PipeError),

    /// Output bytes were not valid UTF-8.
    #[error("child output is not valid UTF-8 ({invalid_bytes} invalid byte(s) after {valid_up_to} valid)")]
    OutputDecodingFailed {
        /// Number of valid bytes before the first invalid sequence.
        valid_up_to: usize,
        /// Length of the first invalid sequence.
        invalid_bytes: usize,
    },

    /// A line-error checker rejected a line of output.
    #[error("error line detected: {reason}: {}", format_line_snippet(line))]
    LineRejected {
        /// The offending line.
        line: String,
        /// Why the checker rejected it.
        reason: String,
    },

    /// `execute_process` was called on an executor that has already run.
    #[error("executor has already been started")]
    AlreadyStarted,

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Result type alias for rust-syncexec operations.
pub type Result<T> = std::result::Result<T, ExecError>;

impl ExecError {
    /// Create an invalid executable path error.
    pub fn invalid_executable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidExecutablePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a line rejection, the usual error returned by line checkers.
    pub fn line_rejected(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LineRejected {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create a decoding error from a UTF-8 failure.
    #[must_use]
    pub fn decoding(err: &std::str::Utf8Error) -> Self {
        Self::OutputDecodingFailed {
            valid_up_to: err.valid_up_to(),
            invalid_bytes: err.error_len().unwrap_or(0),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Check if this error was raised before any process was started.
    #[must_use]
    pub const fn is_pre_launch(&self) -> bool {
        matches!(
            self,
            Self::MissingCommandOrArguments
                | Self::InvalidExecutablePath { .. }
                | Self::InvalidArgument { .. }
                | Self::AlreadyStarted
        )
    }

    /// Check if this is an output decoding failure.
    #[must_use]
    pub const fn is_decoding(&self) -> bool {
        matches!(self, Self::OutputDecodingFailed { .. })
    }

    /// Get the offending line if this error came from a line checker.
    #[must_use]
    pub fn line(&self) -> Option<&str> {
        match self {
            Self::LineRejected { line, .. } => Some(line),
            _ => None,
        }
    }
}
