//! rust-pipe: Async pipe and child-process primitives
//!
//! This crate spawns a child process whose stdout and stderr are merged into
//! a single pipe, exposes that pipe as a readiness-driven, non-blocking reader,
//! and hands out a cloneable handle for signalling the child.
//!
//! # Platform Support
//!
//! - **Unix**: Uses `rustix` for pipe setup and signals, and tokio's `AsyncFd`
//!   for readiness notifications.
//!
//! # Quick Start
//!
//! ```ignore
//! use rust_pipe::{spawn_piped, ReadOutcome, SpawnConfig, SpawnedChild};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let SpawnedChild { mut child, output, .. } =
//!         spawn_piped("/bin/sh", ["-c", "echo hello; echo oops >&2"], &SpawnConfig::default())?;
//!
//!     while let ReadOutcome::Data(bytes) = output.read_available(4096).await? {
//!         print!("{}", String::from_utf8_lossy(&bytes));
//!     }
//!
//!     child.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

#[cfg(unix)]
pub mod unix;

// Re-export primary types
pub use config::{ProcessSignal, SpawnConfig, SpawnConfigBuilder};
pub use error::{PipeError, Result};

// Platform-specific re-exports
#[cfg(unix)]
pub use unix::{
    DEFAULT_READ_CAPACITY, ExitStatus, MergedOutput, PipeChild, ProcessHandle, ReadOutcome,
    SpawnedChild, spawn_piped,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SpawnConfig::default();
        assert!(config.working_directory.is_none());
        assert!(!config.new_process_group);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_echo() {
        let SpawnedChild {
            mut child, output, ..
        } = spawn_piped("/bin/echo", ["test"], &SpawnConfig::default()).unwrap();

        let outcome = output.read_available(DEFAULT_READ_CAPACITY).await.unwrap();
        assert_eq!(outcome.data().map(|b| &b[..]), Some(&b"test\n"[..]));
        assert!(child.wait().await.unwrap().success());
    }
}
