//! Configuration types for spawning piped child processes.
//!
//! This module provides [`SpawnConfig`] for configuring how a child is
//! launched and [`ProcessSignal`] for the signals a [`ProcessHandle`] can send.
//!
//! [`ProcessHandle`]: crate::ProcessHandle

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Configuration for spawning a child with merged output.
///
/// # Example
///
/// ```
/// use rust_pipe::SpawnConfig;
///
/// let config = SpawnConfig::builder()
///     .working_directory("/tmp")
///     .env("LANG", "C.UTF-8")
///     .build();
/// assert!(config.working_directory.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpawnConfig {
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,

    /// Environment variables to set for the child process.
    /// If None, inherits from the parent process.
    pub env: Option<HashMap<OsString, OsString>>,

    /// Additional environment variables to add (merged with inherited).
    pub env_add: HashMap<OsString, OsString>,

    /// Environment variables to remove from inherited environment.
    pub env_remove: Vec<OsString>,

    /// Whether to place the child in its own process group.
    pub new_process_group: bool,
}

impl SpawnConfig {
    /// Create a new builder for `SpawnConfig`.
    #[must_use]
    pub fn builder() -> SpawnConfigBuilder {
        SpawnConfigBuilder::new()
    }

    /// Create a new `SpawnConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective environment for the child process.
    ///
    /// This merges the base environment (inherited or explicit), adds
    /// variables from `env_add`, and removes variables from `env_remove`.
    #[must_use]
    pub fn effective_env(&self) -> HashMap<OsString, OsString> {
        let mut env = self
            .env
            .clone()
            .unwrap_or_else(|| std::env::vars_os().collect());

        env.extend(self.env_add.clone());

        for key in &self.env_remove {
            env.remove(key);
        }

        env
    }
}

/// Builder for [`SpawnConfig`].
#[derive(Debug, Clone, Default)]
pub struct SpawnConfigBuilder {
    config: SpawnConfig,
}

impl SpawnConfigBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Start from an empty environment instead of the inherited one.
    #[must_use]
    pub fn env_clear(mut self) -> Self {
        self.config.env = Some(HashMap::new());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env_add.insert(key.into(), value.into());
        self
    }

    /// Remove an inherited environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.config.env_remove.push(key.into());
        self
    }

    /// Set whether the child gets its own process group.
    #[must_use]
    pub const fn new_process_group(mut self, value: bool) -> Self {
        self.config.new_process_group = value;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> SpawnConfig {
        self.config
    }
}

/// Signals that can be delivered to a running child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProcessSignal {
    /// Terminate signal (SIGTERM).
    Terminate,

    /// Kill signal, cannot be caught (SIGKILL).
    Kill,
}

impl ProcessSignal {
    /// Get the Unix signal number.
    #[cfg(unix)]
    #[must_use]
    pub const fn as_unix_signal(self) -> i32 {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}
