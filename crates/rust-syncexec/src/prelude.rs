//! Convenient re-exports for common rust-syncexec usage.
//!
//! ```ignore
//! use rust_syncexec::prelude::*;
//!
//! let handlers = Handlers::new().interactive(true);
//! let mut executor = CommandExecutor::new(CommandInvocation::new("sync-tool").arg("--setup"), handlers);
//! executor.execute_process().await?;
//! ```

// Running commands
pub use crate::executor::{CommandExecutor, ExecutorState};
pub use crate::invocation::CommandInvocation;

// Handlers
pub use crate::handlers::{ExecutionReport, Handlers, keyword_checker};

// Configuration
pub use crate::config::{ExecutorConfig, LineBuffering, LineEnding};
pub use crate::prompt::{PromptRule, ReplySource};

// Error handling
pub use crate::error::{ExecError, Result};

// Process control
pub use rust_pipe::{ExitStatus, ProcessHandle, ProcessSignal};
