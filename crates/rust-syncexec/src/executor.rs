//! The command executor.
//!
//! A [`CommandExecutor`] runs one [`CommandInvocation`] to completion:
//!
//! 1. `execute_process` validates the invocation and resolves the
//!    executable, failing synchronously if either is wrong.
//! 2. The child is spawned with its stdout and stderr merged into one pipe.
//!    A spawn failure goes to `on_error` and the executor is done.
//! 3. A driver task multiplexes the output reader and the exit watcher,
//!    feeding each line through the line pipeline.
//! 4. On exit the reader is cancelled, the pipe drained, and the handlers
//!    are told about the result exactly once.
//!
//! # Example
//!
//! ```ignore
//! use rust_syncexec::{CommandExecutor, CommandInvocation, Handlers, keyword_checker};
//!
//! let invocation = CommandInvocation::new("/usr/bin/sync-tool")
//!     .args(["--setup", "/data"])
//!     .input("yes");
//! let handlers = Handlers::new()
//!     .interactive(true)
//!     .check_line_for_error(keyword_checker(["error", "fail"]))
//!     .on_termination(|report| println!("{} lines", report.output.len()));
//!
//! let mut executor = CommandExecutor::new(invocation, handlers);
//! executor.execute_process().await?;
//! executor.wait().await;
//! ```

use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_pipe::{
    ExitStatus, MergedOutput, PipeChild, ProcessHandle, ReadOutcome, SpawnedChild, spawn_piped,
};
use tokio::process::ChildStdin;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ExecutorConfig;
use crate::drain::TerminationDrainer;
use crate::error::{ExecError, Result};
use crate::handlers::{ExecutionReport, Handlers};
use crate::invocation::CommandInvocation;
use crate::pipeline::{LinePipeline, OutputLog};
use crate::prompt::PromptResponder;
use crate::reader::OutputStreamReader;
use crate::stdin::StdinChannel;
use crate::validation::validate_invocation;

/// Lifecycle of an executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutorState {
    /// Created, not started.
    #[default]
    Idle,
    /// Spawning the child.
    Launching,
    /// Child running, output being processed.
    Running,
    /// Child exited, remaining output being drained.
    Draining,
    /// Finished; no further callbacks.
    Terminated,
}

impl ExecutorState {
    /// Check if the executor has finished.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Launching => "launching",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Runs one invocation of the sync tool.
pub struct CommandExecutor {
    invocation: CommandInvocation,
    config: ExecutorConfig,
    handlers: Handlers,
    state: Arc<watch::Sender<ExecutorState>>,
    /// Set once the "no handle" notification has been sent.
    released: Arc<AtomicBool>,
    handle: Option<ProcessHandle>,
    task: Option<JoinHandle<ExecutionReport>>,
    report: Option<ExecutionReport>,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("invocation", &self.invocation)
            .field("state", &self.state())
            .field("handle", &self.handle)
            .finish()
    }
}

impl CommandExecutor {
    /// Create an executor with the default configuration.
    #[must_use]
    pub fn new(invocation: CommandInvocation, handlers: Handlers) -> Self {
        Self::with_config(invocation, ExecutorConfig::default(), handlers)
    }

    /// Create an executor with a custom configuration.
    #[must_use]
    pub fn with_config(
        invocation: CommandInvocation,
        config: ExecutorConfig,
        handlers: Handlers,
    ) -> Self {
        let (state, _) = watch::channel(ExecutorState::Idle);
        Self {
            invocation,
            config,
            handlers,
            state: Arc::new(state),
            released: Arc::new(AtomicBool::new(false)),
            handle: None,
            task: None,
            report: None,
        }
    }

    /// Get the invocation.
    #[must_use]
    pub const fn invocation(&self) -> &CommandInvocation {
        &self.invocation
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> ExecutorState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExecutorState> {
        self.state.subscribe()
    }

    /// Get the child's handle while it is running.
    #[must_use]
    pub fn process_handle(&self) -> Option<&ProcessHandle> {
        self.handle.as_ref().filter(|h| h.is_running())
    }

    /// Start the invocation.
    ///
    /// Returns once the child is running (or has failed to start); output is
    /// processed in the background. A spawn failure is reported through
    /// `on_error` only and this still returns `Ok`.
    ///
    /// # Errors
    ///
    /// - [`ExecError::AlreadyStarted`] if this executor has been started before.
    /// - [`ExecError::MissingCommandOrArguments`],
    ///   [`ExecError::InvalidExecutablePath`] or [`ExecError::InvalidArgument`]
    ///   if the invocation is invalid. No pipe or process is created.
    pub async fn execute_process(&mut self) -> Result<()> {
        if self.state() != ExecutorState::Idle {
            return Err(ExecError::AlreadyStarted);
        }

        let env = self.config.spawn.effective_env();
        let program = validate_invocation(
            &self.invocation,
            env.get(OsStr::new("PATH")).map(|p| p.as_os_str()),
        )?;

        self.state.send_replace(ExecutorState::Launching);
        tracing::debug!(command = %self.invocation.command_line(), "launching");

        let spawned = match spawn_piped(&program, &self.invocation.args, &self.config.spawn) {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::warn!(error = %e, program = %program.display(), "launch failed");
                self.state.send_replace(ExecutorState::Terminated);
                self.handlers.error(ExecError::ProcessLaunchFailed(e));
                return Ok(());
            }
        };

        let handle = spawned.child.handle();
        self.handle = Some(handle.clone());
        self.state.send_replace(ExecutorState::Running);
        self.handlers.handle_changed(Some(handle));

        let driver = Driver::new(
            spawned,
            &self.invocation,
            &self.config,
            self.handlers.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.released),
        );
        self.task = Some(tokio::spawn(driver.run()));
        Ok(())
    }

    /// Wait for the run to finish and return its report.
    ///
    /// Returns `None` if the child never launched, the run was cancelled,
    /// or a handler panicked. A panicked run is torn down like a cancelled
    /// one.
    pub async fn wait(&mut self) -> Option<&ExecutionReport> {
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(report) => self.report = Some(report),
                Err(e) if e.is_panic() => {
                    tracing::warn!(command = %self.invocation.command_line(), "execution driver panicked");
                    self.tear_down();
                }
                Err(e) => tracing::debug!(error = %e, "driver task did not complete"),
            }
        }
        self.report.as_ref()
    }

    /// The captured output, once [`wait`](Self::wait) has returned a report.
    #[must_use]
    pub fn output(&self) -> &[String] {
        self.report.as_ref().map_or(&[], |r| r.output.as_slice())
    }

    /// Whether an error was discovered, once [`wait`](Self::wait) has
    /// returned a report.
    #[must_use]
    pub fn error_discovered(&self) -> bool {
        self.report.as_ref().is_some_and(|r| r.error_discovered)
    }

    /// Tear the run down without waiting for the child.
    ///
    /// Kills the child if it is still running and stops the driver task. The
    /// termination handler does not fire for a cancelled run. Idempotent.
    pub fn cancel(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if task.is_finished() {
            self.task = Some(task);
            return;
        }

        task.abort();
        self.tear_down();
        tracing::debug!("execution cancelled");
    }

    /// Kill a still-running child, release its handle and finish.
    fn tear_down(&self) {
        if let Some(handle) = self.handle.as_ref().filter(|h| h.is_running()) {
            if let Err(e) = handle.kill() {
                tracing::debug!(error = %e, "failed to kill child");
            }
        }
        if !self.released.swap(true, Ordering::SeqCst) {
            self.handlers.handle_changed(None);
        }
        self.state.send_replace(ExecutorState::Terminated);
    }
}

/// What woke the driver.
enum Event {
    Output(rust_pipe::Result<ReadOutcome>),
    Exited(rust_pipe::Result<ExitStatus>),
}

/// Owns everything one run needs, on the driver task.
struct Driver {
    command: String,
    child: PipeChild,
    output: MergedOutput,
    stdin: StdinChannel<ChildStdin>,
    reader: OutputStreamReader,
    pipeline: LinePipeline,
    drainer: TerminationDrainer,
    log: OutputLog,
    handlers: Handlers,
    state: Arc<watch::Sender<ExecutorState>>,
    released: Arc<AtomicBool>,
}

impl Driver {
    fn new(
        spawned: SpawnedChild,
        invocation: &CommandInvocation,
        config: &ExecutorConfig,
        handlers: Handlers,
        state: Arc<watch::Sender<ExecutorState>>,
        released: Arc<AtomicBool>,
    ) -> Self {
        let SpawnedChild {
            child,
            stdin,
            output,
        } = spawned;
        let responder = PromptResponder::new(&config.prompt_rules, invocation);
        let structured = invocation.requests_structured_output(&config.structured_output_flags);

        Self {
            command: invocation.command_line(),
            child,
            output,
            stdin: StdinChannel::new(stdin, config.line_ending),
            reader: OutputStreamReader::new(config.line_buffering, config.read_buffer_size),
            pipeline: LinePipeline::new(handlers.mode(), responder, structured),
            drainer: TerminationDrainer::new(config.grace_period),
            log: OutputLog::new(),
            handlers,
            state,
            released,
        }
    }

    async fn run(mut self) -> ExecutionReport {
        let exit_status = loop {
            // Output is polled first so bytes already in the pipe go through
            // the pipeline before the exit is acted on.
            let event = tokio::select! {
                biased;
                read = self.output.read_available(self.reader.capacity()), if self.reader.is_active() => {
                    Event::Output(read)
                }
                status = self.child.wait() => Event::Exited(status),
            };

            match event {
                Event::Output(Ok(ReadOutcome::Data(bytes))) => self.on_chunk(&bytes).await,
                Event::Output(Ok(ReadOutcome::Empty | ReadOutcome::Eof)) => {
                    tracing::trace!("output pipe closed");
                    self.reader.finish();
                }
                Event::Output(Err(e)) => {
                    self.reader.finish();
                    self.handlers.error(ExecError::Pipe(e));
                }
                Event::Exited(Ok(status)) => break Some(status),
                Event::Exited(Err(e)) => {
                    self.handlers.error(ExecError::Pipe(e));
                    break None;
                }
            }
        };

        self.terminate(exit_status).await
    }

    async fn on_chunk(&mut self, bytes: &[u8]) {
        let batch = self.reader.accept(bytes);
        if batch.decode_failed {
            self.log.mark_error();
        }
        if let Some(error) = batch.decode_error {
            self.handlers.error(error);
        }

        if matches!(self.child.try_wait(), Ok(Some(_))) {
            self.stdin.mark_child_exited();
        }

        for line in batch.lines {
            self.pipeline
                .process(line, &mut self.log, &mut self.stdin, &self.handlers)
                .await;
        }
        self.pipeline
            .process_partial(self.reader.pending_line(), &mut self.stdin, &self.handlers)
            .await;
    }

    async fn terminate(mut self, exit_status: Option<ExitStatus>) -> ExecutionReport {
        self.state.send_replace(ExecutorState::Draining);
        self.stdin.mark_child_exited();

        self.drainer
            .drain(&mut self.reader, &self.output, &mut self.log, &self.handlers)
            .await;
        self.stdin.close().await;
        drop(self.output);

        let (output, error_discovered) = self.log.into_parts();
        let report = ExecutionReport {
            command: self.command,
            output,
            error_discovered,
            exit_status,
        };
        tracing::debug!(
            lines = report.output.len(),
            error_discovered,
            status = ?report.exit_status,
            "execution finished"
        );

        self.handlers.terminated(&report);
        if report.error_discovered {
            tokio::spawn(
                self.handlers
                    .log(report.command.clone(), report.output.clone()),
            );
        }
        if !self.released.swap(true, Ordering::SeqCst) {
            self.handlers.handle_changed(None);
        }
        self.state.send_replace(ExecutorState::Terminated);

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_errors() -> (Handlers, Arc<Mutex<Vec<String>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let handlers = Handlers::new().on_error(move |e| sink.lock().unwrap().push(e.to_string()));
        (handlers, errors)
    }

    #[test]
    fn state_display() {
        assert_eq!(ExecutorState::Draining.to_string(), "draining");
        assert!(ExecutorState::Terminated.is_terminated());
        assert_eq!(ExecutorState::default(), ExecutorState::Idle);
    }

    #[tokio::test]
    async fn echo_output_is_captured() {
        let invocation = CommandInvocation::new("/bin/echo").args(["Hello", "World"]);
        let mut executor = CommandExecutor::new(invocation, Handlers::new());

        executor.execute_process().await.unwrap();
        let report = executor.wait().await.unwrap();

        assert_eq!(report.output, vec!["Hello World"]);
        assert!(!report.error_discovered);
        assert_eq!(report.exit_status, Some(ExitStatus::Exited(0)));
        assert_eq!(executor.state(), ExecutorState::Terminated);
        assert!(executor.process_handle().is_none());
    }

    #[tokio::test]
    async fn validation_failure_leaves_executor_idle() {
        let invocation = CommandInvocation::new("/no/such/sync-tool").arg("--setup");
        let mut executor = CommandExecutor::new(invocation, Handlers::new());

        let err = executor.execute_process().await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidExecutablePath { .. }));
        assert_eq!(executor.state(), ExecutorState::Idle);
        assert!(executor.wait().await.is_none());
    }

    #[tokio::test]
    async fn spawn_failure_goes_to_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let config = ExecutorConfig::new().spawn(
            rust_pipe::SpawnConfig::builder()
                .working_directory(&missing)
                .build(),
        );
        let (handlers, errors) = collecting_errors();
        let invocation = CommandInvocation::new("/bin/echo").arg("hi");
        let mut executor = CommandExecutor::with_config(invocation, config, handlers);

        executor.execute_process().await.unwrap();

        assert_eq!(executor.state(), ExecutorState::Terminated);
        assert!(executor.wait().await.is_none());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("failed to launch process"));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let invocation = CommandInvocation::new("/bin/echo").arg("once");
        let mut executor = CommandExecutor::new(invocation, Handlers::new());

        executor.execute_process().await.unwrap();
        assert!(matches!(
            executor.execute_process().await,
            Err(ExecError::AlreadyStarted)
        ));
        executor.wait().await;
    }

    #[tokio::test]
    async fn cancel_kills_child_without_termination() {
        let terminated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&terminated);
        let handlers = Handlers::new().on_termination(move |_| flag.store(true, Ordering::SeqCst));
        let invocation = CommandInvocation::new("/bin/sh").args(["-c", "exec sleep 30"]);
        let mut executor = CommandExecutor::new(invocation, handlers);

        executor.execute_process().await.unwrap();
        let handle = executor.process_handle().cloned().unwrap();
        executor.cancel();
        executor.cancel();

        assert_eq!(executor.state(), ExecutorState::Terminated);
        assert!(executor.wait().await.is_none());
        assert!(!terminated.load(Ordering::SeqCst));
        assert!(handle.pid() > 0);
    }

    #[tokio::test]
    async fn panicking_handler_tears_run_down() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let handlers = Handlers::new()
            .check_line_for_error(|_| panic!("line checker failed"))
            .on_process_handle_changed(move |h: Option<ProcessHandle>| {
                if h.is_none() {
                    flag.store(true, Ordering::SeqCst);
                }
            });
        let invocation = CommandInvocation::new("/bin/sh").args(["-c", "echo started; exec sleep 30"]);
        let mut executor = CommandExecutor::new(invocation, handlers);

        executor.execute_process().await.unwrap();
        let waited = tokio::time::timeout(std::time::Duration::from_secs(10), executor.wait()).await;

        assert!(waited.unwrap().is_none());
        assert_eq!(executor.state(), ExecutorState::Terminated);
        assert!(released.load(Ordering::SeqCst));
    }
}
