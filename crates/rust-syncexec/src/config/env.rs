//! Environment-based configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{ExecutorConfig, LineBuffering};
use crate::error::{ExecError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "SYNCEXEC";

/// Recognised variable names (without prefix).
pub mod vars {
    /// Drain grace period in milliseconds.
    pub const GRACE_PERIOD_MS: &str = "GRACE_PERIOD_MS";
    /// Snapshot read size in bytes.
    pub const READ_BUFFER_SIZE: &str = "READ_BUFFER_SIZE";
    /// `immediate` or `buffered`.
    pub const LINE_BUFFERING: &str = "LINE_BUFFERING";
    /// Working directory for the child.
    pub const WORKING_DIR: &str = "WORKING_DIR";
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable reader.
#[derive(Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Where values come from; the process environment by default.
    lookup: Lookup,
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader over the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Create a reader over a custom variable source.
    #[must_use]
    pub fn with_lookup<F>(prefix: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            lookup: Arc::new(lookup),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.var_name(name)).filter(|v| !v.is_empty())
    }

    /// Get a parsed value, failing on values that do not parse.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] naming the variable and the bad value.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    ExecError::config(format!("{}={value}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a duration in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] if the value is not an integer.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Overlay recognised variables onto `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] on the first invalid value.
    pub fn apply(&self, config: &mut ExecutorConfig) -> Result<()> {
        if let Some(grace) = self.duration_millis(vars::GRACE_PERIOD_MS)? {
            config.grace_period = grace;
        }
        if let Some(size) = self.parse::<usize>(vars::READ_BUFFER_SIZE)? {
            if size == 0 {
                return Err(ExecError::config(format!(
                    "{} must be greater than zero",
                    self.var_name(vars::READ_BUFFER_SIZE)
                )));
            }
            config.read_buffer_size = size;
        }
        if let Some(buffering) = self.parse::<LineBuffering>(vars::LINE_BUFFERING)? {
            config.line_buffering = buffering;
        }
        if let Some(dir) = self.get(vars::WORKING_DIR) {
            config.spawn.working_directory = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvConfig::with_lookup(DEFAULT_PREFIX, move |name| map.get(name).cloned())
    }

    #[test]
    fn var_name_uses_prefix() {
        let env = EnvConfig::new("SYNCEXEC");
        assert_eq!(env.var_name("grace_period_ms"), "SYNCEXEC_GRACE_PERIOD_MS");

        let env = EnvConfig::new("");
        assert_eq!(env.var_name("path"), "PATH");
    }

    #[test]
    fn apply_overrides_values() {
        let env = env_from(&[
            ("SYNCEXEC_GRACE_PERIOD_MS", "10"),
            ("SYNCEXEC_READ_BUFFER_SIZE", "2048"),
            ("SYNCEXEC_LINE_BUFFERING", "buffered"),
            ("SYNCEXEC_WORKING_DIR", "/tmp"),
        ]);

        let mut config = ExecutorConfig::default();
        env.apply(&mut config).unwrap();

        assert_eq!(config.grace_period, Duration::from_millis(10));
        assert_eq!(config.read_buffer_size, 2048);
        assert_eq!(config.line_buffering, LineBuffering::Buffered);
        assert_eq!(config.spawn.working_directory, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn unset_and_empty_values_are_ignored() {
        let env = env_from(&[("SYNCEXEC_GRACE_PERIOD_MS", "")]);
        let mut config = ExecutorConfig::default();
        env.apply(&mut config).unwrap();
        assert_eq!(config.grace_period, super::super::DEFAULT_GRACE_PERIOD);
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let env = env_from(&[("SYNCEXEC_GRACE_PERIOD_MS", "soon")]);
        let err = env.apply(&mut ExecutorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("SYNCEXEC_GRACE_PERIOD_MS=soon"));
    }

    #[test]
    fn zero_read_buffer_is_rejected() {
        let env = env_from(&[("SYNCEXEC_READ_BUFFER_SIZE", "0")]);
        assert!(env.apply(&mut ExecutorConfig::default()).is_err());
    }
}
