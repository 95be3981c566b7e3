//! rust-syncexec: Scripted execution engine for interactive sync tools
//!
//! This crate runs a command-line synchronization tool on behalf of a host
//! application. It captures the tool's combined output line by line, flags
//! error lines as they arrive, answers the tool's interactive prompts from a
//! rule table, and guarantees that every byte the tool wrote is in the final
//! report before the termination handler fires.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime
//! - **Merged stdout/stderr** capture via `rust-pipe`
//! - **Prompt automation** with replies resolved up front from the invocation
//! - **Live error detection** through a pluggable line checker
//! - **Drain on exit** so output written just before exit is never lost
//! - **Layered configuration** from defaults, TOML files and `SYNCEXEC_*`
//!   environment variables
//!
//! # Example
//!
//! ```ignore
//! use rust_syncexec::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let invocation = CommandInvocation::new("/bin/echo").args(["Hello", "World"]);
//!     let handlers = Handlers::new()
//!         .check_line_for_error(keyword_checker(["error"]))
//!         .on_termination(|report| println!("{:?}", report.output));
//!
//!     let mut executor = CommandExecutor::new(invocation, handlers);
//!     executor.execute_process().await?;
//!     executor.wait().await;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("rust-syncexec currently supports Unix platforms only");

pub mod config;
pub mod decode;
pub mod drain;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod invocation;
pub mod pipeline;
pub mod prelude;
pub mod prompt;
pub mod reader;
pub mod stdin;
pub mod validation;

pub use config::{ExecutorConfig, LineBuffering, LineEnding};
pub use decode::{DecodedChunk, LineDecoder};
pub use drain::{SnapshotRead, TerminationDrainer};
pub use error::{ExecError, Result};
pub use executor::{CommandExecutor, ExecutorState};
pub use handlers::{ExecutionReport, Handlers, keyword_checker};
pub use invocation::CommandInvocation;
pub use pipeline::{LinePipeline, OutputLog, PipelineMode};
pub use prompt::{PromptResponder, PromptRule, ReplySource, ResolvedPrompt, default_rules};
pub use reader::{OutputStreamReader, ReaderBatch, ReaderState};
pub use stdin::StdinChannel;

// Types from rust-pipe that appear in this crate's API.
pub use rust_pipe::{ExitStatus, ProcessHandle, ProcessSignal, SpawnConfig};
