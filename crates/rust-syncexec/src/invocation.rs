//! The command a [`CommandExecutor`](crate::CommandExecutor) runs.

use std::path::{Path, PathBuf};

/// One invocation of the sync tool: what to run and the answers to feed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Path (or bare name) of the executable.
    pub command: Option<PathBuf>,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Reply for the error reporting mode prompt.
    pub sync_mode: Option<String>,
    /// Reply for yes/no confirmation prompts.
    pub input: Option<String>,
}

impl CommandInvocation {
    /// Create an invocation of `command` with no arguments yet.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: Some(command.into()),
            ..Default::default()
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the sync-mode reply.
    #[must_use]
    pub fn sync_mode(mut self, mode: impl Into<String>) -> Self {
        self.sync_mode = Some(mode.into());
        self
    }

    /// Set the confirmation reply.
    #[must_use]
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Get the command path, if set.
    #[must_use]
    pub fn command_path(&self) -> Option<&Path> {
        self.command.as_deref()
    }

    /// Render the command and arguments as a single display string.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self
            .command
            .as_ref()
            .map(|c| c.display().to_string())
            .unwrap_or_default();
        for arg in &self.args {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(arg);
        }
        line
    }

    /// Check whether any argument asks for structured output.
    ///
    /// An argument matches when it starts with one of `flags`, so
    /// `--dump-all` matches `--dump`.
    #[must_use]
    pub fn requests_structured_output<S: AsRef<str>>(&self, flags: &[S]) -> bool {
        self.args
            .iter()
            .any(|arg| flags.iter().any(|flag| arg.starts_with(flag.as_ref())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let inv = CommandInvocation::new("/usr/bin/sync-tool")
            .arg("--setup")
            .args(["--folder", "/data"])
            .sync_mode("minimal")
            .input("yes");

        assert_eq!(inv.command_path(), Some(Path::new("/usr/bin/sync-tool")));
        assert_eq!(inv.args, vec!["--setup", "--folder", "/data"]);
        assert_eq!(inv.sync_mode.as_deref(), Some("minimal"));
        assert_eq!(inv.input.as_deref(), Some("yes"));
    }

    #[test]
    fn command_line_joins_arguments() {
        let inv = CommandInvocation::new("/bin/echo").args(["Hello", "World"]);
        assert_eq!(inv.command_line(), "/bin/echo Hello World");

        let inv = CommandInvocation::default().arg("orphan");
        assert_eq!(inv.command_line(), "orphan");
    }

    #[test]
    fn structured_output_matches_by_prefix() {
        let flags = ["--dump", "--json"];

        let inv = CommandInvocation::new("tool").args(["--dump-config"]);
        assert!(inv.requests_structured_output(&flags));

        let inv = CommandInvocation::new("tool").args(["status", "--json"]);
        assert!(inv.requests_structured_output(&flags));

        let inv = CommandInvocation::new("tool").args(["status", "dump"]);
        assert!(!inv.requests_structured_output(&flags));

        let none: [&str; 0] = [];
        assert!(!inv.requests_structured_output(&none));
    }
}
