//! Per-line processing: capture, prompt answering and error checks.

use tokio::io::AsyncWrite;

use crate::handlers::Handlers;
use crate::prompt::PromptResponder;
use crate::stdin::StdinChannel;

/// Which line pipeline variant runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineMode {
    /// Capture and error-check only.
    #[default]
    NonInteractive,
    /// Also answer prompts; error checks are skipped for structured output.
    Interactive,
}

/// Output captured so far and the sticky error flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputLog {
    lines: Vec<String>,
    error_discovered: bool,
}

impl OutputLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line.
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Captured lines in arrival order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of captured lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether an error has been discovered.
    #[must_use]
    pub const fn error_discovered(&self) -> bool {
        self.error_discovered
    }

    /// Set the error flag. Returns `true` only on the first call.
    pub const fn mark_error(&mut self) -> bool {
        let first = !self.error_discovered;
        self.error_discovered = true;
        first
    }

    /// Consume the log, returning the lines and the error flag.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, bool) {
        (self.lines, self.error_discovered)
    }
}

/// The line pipeline of one execution.
#[derive(Debug, Clone)]
pub struct LinePipeline {
    mode: PipelineMode,
    responder: PromptResponder,
    structured_output: bool,
    /// Prompts already answered from the unterminated line, by table index.
    partial_answered: Vec<usize>,
}

impl LinePipeline {
    /// Create a pipeline.
    ///
    /// `structured_output` is whether the invocation asked for machine-readable
    /// output; it only matters in interactive mode.
    #[must_use]
    pub const fn new(mode: PipelineMode, responder: PromptResponder, structured_output: bool) -> Self {
        Self {
            mode,
            responder,
            structured_output,
            partial_answered: Vec::new(),
        }
    }

    /// Get the mode.
    #[must_use]
    pub const fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Whether the error check runs for lines of this execution.
    #[must_use]
    pub const fn checks_lines(&self) -> bool {
        match self.mode {
            PipelineMode::NonInteractive => true,
            // Structured output can carry the word "error" as plain data.
            PipelineMode::Interactive => !self.structured_output,
        }
    }

    /// Run one line through the pipeline.
    ///
    /// Prompts already answered while the line was incomplete are not
    /// answered again.
    pub async fn process<W>(
        &mut self,
        line: String,
        log: &mut OutputLog,
        stdin: &mut StdinChannel<W>,
        handlers: &Handlers,
    ) where
        W: AsyncWrite + Unpin,
    {
        let mut answered = std::mem::take(&mut self.partial_answered);
        if self.mode == PipelineMode::Interactive {
            if let Err(e) = self.responder.respond_once(&line, &mut answered, stdin).await {
                tracing::warn!(error = %e, "failed to answer prompt");
                handlers.error(e);
            }
        }

        if !log.error_discovered() && self.checks_lines() {
            if let Err(e) = handlers.check_line(&line) {
                tracing::debug!(line = %line, "error line detected");
                log.mark_error();
                handlers.error(e);
            }
        }

        log.push(line);
    }

    /// Answer prompts in the unterminated line a buffered reader is holding.
    ///
    /// A prompt usually ends without a newline and the child then blocks on
    /// stdin, so waiting for the line to complete would never finish. The
    /// text is not captured or error-checked here; that happens once the line
    /// completes and goes through [`process`](Self::process).
    pub async fn process_partial<W>(
        &mut self,
        partial: &str,
        stdin: &mut StdinChannel<W>,
        handlers: &Handlers,
    ) where
        W: AsyncWrite + Unpin,
    {
        if self.mode != PipelineMode::Interactive || partial.is_empty() {
            return;
        }
        if let Err(e) = self
            .responder
            .respond_once(partial, &mut self.partial_answered, stdin)
            .await
        {
            tracing::warn!(error = %e, "failed to answer prompt");
            handlers.error(e);
        }
    }
}
