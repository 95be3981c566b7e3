//! Pre-launch checks on a [`CommandInvocation`].
//!
//! Everything here runs before any pipe is created, so a failure never
//! leaves a half-started child behind.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{ExecError, Result};
use crate::invocation::CommandInvocation;

/// Check if a string contains null bytes.
#[must_use]
pub fn contains_null_byte(s: &str) -> bool {
    s.contains('\0')
}

/// Validate an invocation and resolve its executable.
///
/// Bare command names are searched on `search_path` (normally the value of
/// `PATH`); anything containing a separator is used as given.
///
/// # Errors
///
/// - [`ExecError::MissingCommandOrArguments`] if the command is unset or
///   empty, or there are no arguments.
/// - [`ExecError::InvalidExecutablePath`] if the command cannot be resolved
///   to a runnable file.
/// - [`ExecError::InvalidArgument`] if an argument contains a null byte.
pub fn validate_invocation(
    invocation: &CommandInvocation,
    search_path: Option<&OsStr>,
) -> Result<PathBuf> {
    let command = invocation
        .command_path()
        .filter(|c| !c.as_os_str().is_empty())
        .ok_or(ExecError::MissingCommandOrArguments)?;
    if invocation.args.is_empty() {
        return Err(ExecError::MissingCommandOrArguments);
    }

    if command.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(ExecError::invalid_executable(command, "path contains null byte"));
    }
    for (index, arg) in invocation.args.iter().enumerate() {
        if contains_null_byte(arg) {
            return Err(ExecError::InvalidArgument {
                index,
                reason: "argument contains null byte".to_string(),
            });
        }
    }

    resolve_executable(command, search_path)
}

/// Resolve `command` to the absolute path of a runnable file.
///
/// Relative paths are resolved against the current directory, not the
/// child's working directory.
///
/// # Errors
///
/// Returns [`ExecError::InvalidExecutablePath`] if nothing runnable is found.
pub fn resolve_executable(command: &Path, search_path: Option<&OsStr>) -> Result<PathBuf> {
    if command.components().count() > 1 || command.is_absolute() {
        check_executable(command)?;
        return absolute(command);
    }

    let Some(search_path) = search_path else {
        return Err(ExecError::invalid_executable(command, "not found: PATH is not set"));
    };

    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(command))
        .find(|candidate| check_executable(candidate).is_ok())
        .ok_or_else(|| ExecError::invalid_executable(command, "not found in PATH"))
        .and_then(|found| absolute(&found))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| ExecError::invalid_executable(path, format!("cannot resolve: {e}")))
}

/// Verify that `path` is an existing, executable regular file.
///
/// # Errors
///
/// Returns [`ExecError::InvalidExecutablePath`] describing the first failed
/// check.
pub fn check_executable(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ExecError::invalid_executable(path, format!("cannot access: {e}")))?;
    if !metadata.is_file() {
        return Err(ExecError::invalid_executable(path, "not a regular file"));
    }

    #[cfg(unix)]
    rustix::fs::access(path, rustix::fs::Access::EXEC_OK)
        .map_err(|_| ExecError::invalid_executable(path, "not executable"))?;

    Ok(())
}
