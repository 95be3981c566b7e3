//! Configuration types for rust-syncexec.
//!
//! [`ExecutorConfig`] collects every tunable of an execution: the drain grace
//! period, read sizing, line handling, the prompt rule table and how the child
//! is spawned. Values can be layered from a TOML file ([`file`]) and from
//! `SYNCEXEC_*` environment variables ([`env`]).

pub mod env;
pub mod file;

use std::path::Path;
use std::time::Duration;

use rust_pipe::SpawnConfig;
use serde::Deserialize;

use crate::error::Result;
use crate::prompt::{PromptRule, default_rules};

/// Default pause before draining the output pipe after the child exits.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(50);

/// Default snapshot read size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = rust_pipe::DEFAULT_READ_CAPACITY;

/// Arguments that switch the sync tool into machine-readable output.
pub const DEFAULT_STRUCTURED_OUTPUT_FLAGS: &[&str] = &["--dump", "--json"];

/// How text without a trailing newline is handled between reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineBuffering {
    /// Emit a trailing partial chunk immediately as its own line.
    ///
    /// A line split across two reads shows up as two entries.
    #[default]
    Immediate,

    /// Keep a trailing partial line until its newline arrives (or the drain
    /// completes), reconstructing lines exactly.
    Buffered,
}

impl std::str::FromStr for LineBuffering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "buffered" => Ok(Self::Buffered),
            other => Err(format!("unknown line buffering mode '{other}'")),
        }
    }
}

/// Line ending styles used when replying to prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Configuration for a [`CommandExecutor`](crate::CommandExecutor).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Pause between the exit notification and the drain loop.
    pub grace_period: Duration,

    /// Maximum bytes taken per snapshot read.
    pub read_buffer_size: usize,

    /// Partial-line handling.
    pub line_buffering: LineBuffering,

    /// Terminator appended to prompt replies.
    pub line_ending: LineEnding,

    /// Argument prefixes that request structured (dump) output.
    pub structured_output_flags: Vec<String>,

    /// Ordered prompt rule table.
    pub prompt_rules: Vec<PromptRule>,

    /// How the child process is spawned.
    pub spawn: SpawnConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            line_buffering: LineBuffering::default(),
            line_ending: LineEnding::default(),
            structured_output_flags: DEFAULT_STRUCTURED_OUTPUT_FLAGS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            prompt_rules: default_rules(),
            spawn: SpawnConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, then the given TOML file, then `SYNCEXEC_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`](crate::ExecError::Config) if the file
    /// cannot be read or parsed, or a variable holds an invalid value.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        file::ConfigFile::load(path.as_ref())?.apply(&mut config);
        env::EnvConfig::default().apply(&mut config)?;
        Ok(config)
    }

    /// Load defaults, then `SYNCEXEC_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`](crate::ExecError::Config) if a variable
    /// holds an invalid value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        env::EnvConfig::default().apply(&mut config)?;
        Ok(config)
    }

    /// Set the drain grace period.
    #[must_use]
    pub const fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set the snapshot read size.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the partial-line handling.
    #[must_use]
    pub const fn line_buffering(mut self, buffering: LineBuffering) -> Self {
        self.line_buffering = buffering;
        self
    }

    /// Set the prompt reply terminator.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Replace the structured-output argument prefixes.
    #[must_use]
    pub fn structured_output_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.structured_output_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the prompt rule table.
    #[must_use]
    pub fn prompt_rules(mut self, rules: Vec<PromptRule>) -> Self {
        self.prompt_rules = rules;
        self
    }

    /// Set how the child is spawned.
    #[must_use]
    pub fn spawn(mut self, spawn: SpawnConfig) -> Self {
        self.spawn = spawn;
        self
    }
}
