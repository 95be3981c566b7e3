//! File-based configuration loading.
//!
//! ```toml
//! grace_period_ms = 100
//! line_buffering = "buffered"
//! structured_output_flags = ["--dump", "--display-config"]
//! working_directory = "/var/lib/sync"
//!
//! [env]
//! LANG = "C.UTF-8"
//!
//! [[prompt]]
//! trigger = "continue sync setup"
//! source = "input"
//! default = "yes"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{ExecutorConfig, LineBuffering, LineEnding};
use crate::error::{ExecError, Result};
use crate::prompt::PromptRule;

/// Default configuration file name searched by [`ConfigLoader`].
pub const DEFAULT_FILE_NAME: &str = "syncexec.toml";

/// The on-disk shape of an executor configuration.
///
/// Every field is optional; only the ones present override the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Drain grace period in milliseconds.
    pub grace_period_ms: Option<u64>,
    /// Snapshot read size in bytes.
    pub read_buffer_size: Option<usize>,
    /// Partial-line handling.
    pub line_buffering: Option<LineBuffering>,
    /// Prompt reply terminator.
    pub line_ending: Option<LineEnding>,
    /// Structured-output argument prefixes.
    pub structured_output_flags: Option<Vec<String>>,
    /// Working directory for the child.
    pub working_directory: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,
    /// Replacement prompt rule table.
    #[serde(rename = "prompt")]
    pub prompts: Option<Vec<PromptRule>>,
}

impl ConfigFile {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] if the text is not a valid configuration.
    pub fn parse(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content).map_err(|e| ExecError::config(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExecError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded executor config file");
        Self::parse(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.read_buffer_size == Some(0) {
            return Err(ExecError::config("read_buffer_size must be greater than zero"));
        }
        if let Some(ref prompts) = self.prompts {
            if let Some(rule) = prompts.iter().find(|r| r.trigger.is_empty()) {
                return Err(ExecError::config(format!(
                    "prompt rule with reply '{}' has an empty trigger",
                    rule.default_reply
                )));
            }
        }
        Ok(())
    }

    /// Overlay the values present in this file onto `config`.
    pub fn apply(self, config: &mut ExecutorConfig) {
        if let Some(ms) = self.grace_period_ms {
            config.grace_period = Duration::from_millis(ms);
        }
        if let Some(size) = self.read_buffer_size {
            config.read_buffer_size = size;
        }
        if let Some(buffering) = self.line_buffering {
            config.line_buffering = buffering;
        }
        if let Some(line_ending) = self.line_ending {
            config.line_ending = line_ending;
        }
        if let Some(flags) = self.structured_output_flags {
            config.structured_output_flags = flags;
        }
        if let Some(dir) = self.working_directory {
            config.spawn.working_directory = Some(dir);
        }
        for (key, value) in self.env {
            config.spawn.env_add.insert(key.into(), value.into());
        }
        if let Some(prompts) = self.prompts {
            config.prompt_rules = prompts;
        }
    }
}

/// Finds a configuration file in a list of directories.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Search paths, in priority order.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a search path.
    #[must_use]
    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Find a config file by name, trying `name` and then `name.toml`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        for search_path in &self.search_paths {
            let path = search_path.join(name);
            if path.is_file() {
                return Some(path);
            }

            let path = search_path.join(format!("{name}.toml"));
            if path.is_file() {
                return Some(path);
            }
        }

        None
    }

    /// Load the first matching file, or defaults if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] if a file is found but cannot be parsed.
    pub fn load_or_default(&self, name: &str) -> Result<ExecutorConfig> {
        let mut config = ExecutorConfig::default();
        if let Some(path) = self.find(name) {
            ConfigFile::load(&path)?.apply(&mut config);
        }
        Ok(config)
    }
}
