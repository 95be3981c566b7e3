//! Callbacks through which an execution reports to its host.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rust_pipe::{ExitStatus, ProcessHandle};

use crate::error::{ExecError, Result};
use crate::pipeline::PipelineMode;

/// Hook called once with the final report.
pub type TerminationHook = Arc<dyn Fn(&ExecutionReport) + Send + Sync>;

/// Hook deciding whether a line signals an error.
pub type LineCheckHook = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Hook told about the running child's handle.
pub type ProcessHandleHook = Arc<dyn Fn(Option<ProcessHandle>) + Send + Sync>;

/// Hook receiving every error raised after launch.
pub type ErrorHook = Arc<dyn Fn(ExecError) + Send + Sync>;

/// Hook persisting the output of a failed run.
pub type LogHook = Arc<dyn Fn(String, Vec<String>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Final state of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// The command line that was run.
    pub command: String,
    /// Every output line, in the order the child wrote them.
    pub output: Vec<String>,
    /// Whether a line check or decoding failed during the run.
    pub error_discovered: bool,
    /// How the child exited. Informational; never feeds `error_discovered`.
    pub exit_status: Option<ExitStatus>,
}

/// The handler set of an executor.
#[derive(Clone)]
pub struct Handlers {
    on_termination: TerminationHook,
    check_line_for_error: LineCheckHook,
    on_process_handle_changed: ProcessHandleHook,
    on_error: ErrorHook,
    log_async: LogHook,
    mode: PipelineMode,
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            on_termination: Arc::new(|_: &ExecutionReport| {}),
            check_line_for_error: Arc::new(|_: &str| Ok(())),
            on_process_handle_changed: Arc::new(|_: Option<ProcessHandle>| {}),
            on_error: Arc::new(|error: ExecError| tracing::warn!(%error, "execution error")),
            log_async: Arc::new(|command: String, output: Vec<String>| {
                async move {
                    tracing::warn!(%command, lines = output.len(), "command reported errors");
                }
                .boxed()
            }),
            mode: PipelineMode::default(),
        }
    }
}

impl Handlers {
    /// Create a handler set with default hooks in non-interactive mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the termination hook.
    #[must_use]
    pub fn on_termination<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ExecutionReport) + Send + Sync + 'static,
    {
        self.on_termination = Arc::new(hook);
        self
    }

    /// Set the line error check.
    #[must_use]
    pub fn check_line_for_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.check_line_for_error = Arc::new(hook);
        self
    }

    /// Set the process handle hook.
    #[must_use]
    pub fn on_process_handle_changed<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<ProcessHandle>) + Send + Sync + 'static,
    {
        self.on_process_handle_changed = Arc::new(hook);
        self
    }

    /// Set the error hook.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(ExecError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(hook);
        self
    }

    /// Set the async logger.
    #[must_use]
    pub fn log_async<F>(mut self, hook: F) -> Self
    where
        F: Fn(String, Vec<String>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.log_async = Arc::new(hook);
        self
    }

    /// Select interactive (prompt answering) or non-interactive processing.
    #[must_use]
    pub const fn interactive(mut self, interactive: bool) -> Self {
        self.mode = if interactive {
            PipelineMode::Interactive
        } else {
            PipelineMode::NonInteractive
        };
        self
    }

    /// Get the line pipeline mode.
    #[must_use]
    pub const fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub(crate) fn terminated(&self, report: &ExecutionReport) {
        (self.on_termination)(report);
    }

    pub(crate) fn check_line(&self, line: &str) -> Result<()> {
        (self.check_line_for_error)(line)
    }

    pub(crate) fn handle_changed(&self, handle: Option<ProcessHandle>) {
        (self.on_process_handle_changed)(handle);
    }

    pub(crate) fn error(&self, error: ExecError) {
        (self.on_error)(error);
    }

    pub(crate) fn log(&self, command: String, output: Vec<String>) -> BoxFuture<'static, ()> {
        (self.log_async)(command, output)
    }
}

/// Build a line check that rejects lines containing any of `keywords`,
/// ignoring case.
pub fn keyword_checker<I, S>(keywords: I) -> impl Fn(&str) -> Result<()> + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.into().to_lowercase())
        .collect();

    move |line: &str| {
        let lowered = line.to_lowercase();
        match keywords.iter().find(|k| lowered.contains(k.as_str())) {
            Some(keyword) => Err(ExecError::line_rejected(line, format!("contains '{keyword}'"))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn defaults_accept_every_line() {
        let handlers = Handlers::new();
        assert!(handlers.check_line("fatal error").is_ok());
        assert_eq!(handlers.mode(), PipelineMode::NonInteractive);
    }

    #[test]
    fn interactive_flag() {
        assert_eq!(
            Handlers::new().interactive(true).mode(),
            PipelineMode::Interactive
        );
    }

    #[test]
    fn hooks_are_invoked() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let handlers = Handlers::new().on_error(move |e| sink.lock().unwrap().push(e.to_string()));

        handlers.error(ExecError::AlreadyStarted);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn log_hook_receives_command_and_output() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let handlers = Handlers::new().log_async(move |command, output| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                *sink.lock().unwrap() = Some((command, output));
            })
        });

        handlers.log("tool --setup".into(), vec!["failed".into()]).await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, Some(("tool --setup".to_string(), vec!["failed".to_string()])));
    }

    #[test]
    fn keyword_checker_ignores_case() {
        let check = keyword_checker(["fail", "Error"]);
        assert!(check("all good").is_ok());

        let err = check("Sync FAILED").unwrap_err();
        assert_eq!(err.line(), Some("Sync FAILED"));
        assert!(err.to_string().contains("contains 'fail'"));

        assert!(check("an error occurred").is_err());
    }
}
