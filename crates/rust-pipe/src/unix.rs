//! Unix platform implementation for piped child processes.
//!
//! This module provides:
//!
//! - A merged stdout/stderr pipe whose read end is driven by tokio's `AsyncFd`
//! - Child spawning with a piped stdin and the merged output pipe
//! - A pid-based [`ProcessHandle`] for signalling a running child
//!
//! # Example
//!
//! ```ignore
//! use rust_pipe::unix::{spawn_piped, SpawnedChild};
//! use rust_pipe::SpawnConfig;
//!
//! let SpawnedChild { mut child, output, .. } =
//!     spawn_piped("/bin/echo", ["hello"], &SpawnConfig::default())?;
//! let chunk = output.read_available(4096).await?;
//! child.wait().await?;
//! ```

mod child;
mod pipe;

pub use child::{ExitStatus, PipeChild, ProcessHandle, SpawnedChild, spawn_piped};
pub use pipe::{DEFAULT_READ_CAPACITY, MergedOutput, ReadOutcome};
