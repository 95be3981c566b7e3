//! Unix child process management for piped children.
//!
//! This module spawns a child whose stdout and stderr share one
//! [`MergedOutput`] pipe and whose stdin is a regular tokio pipe, and
//! provides the owning [`PipeChild`] plus a cloneable [`ProcessHandle`].

use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus as StdExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustix::process::{Pid, Signal, kill_process};
use tokio::process::{Child as TokioChild, ChildStdin, Command};

use super::pipe::MergedOutput;
use crate::config::{ProcessSignal, SpawnConfig};
use crate::error::{PipeError, Result};

/// Exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),

    /// The process was terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if available.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {code}"),
            Self::Signaled(signal) => write!(f, "signal {signal}"),
        }
    }
}

/// Cloneable, pid-based handle to a running child.
///
/// The handle does not own the process; it only allows observers to signal
/// it. Once the owner reaps the child, [`is_running`](Self::is_running)
/// reports `false` and signalling is refused so a recycled pid is never hit.
#[derive(Clone)]
pub struct ProcessHandle {
    pid: u32,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProcessHandle {
    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Check if the process is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Send a signal to the child process.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::NotRunning`] once the child has been reaped, or
    /// [`PipeError::Signal`] if delivery fails.
    pub fn signal(&self, signal: ProcessSignal) -> Result<()> {
        if !self.is_running() {
            return Err(PipeError::NotRunning { pid: self.pid });
        }

        let pid = i32::try_from(self.pid)
            .ok()
            .and_then(Pid::from_raw)
            .ok_or_else(|| {
                PipeError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"))
            })?;

        let signal = Signal::from_named_raw(signal.as_unix_signal()).ok_or_else(|| {
            PipeError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid signal"))
        })?;

        kill_process(pid, signal)
            .map_err(|e| PipeError::Signal(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Ask the child to terminate (SIGTERM).
    ///
    /// # Errors
    ///
    /// See [`signal`](Self::signal).
    pub fn terminate(&self) -> Result<()> {
        self.signal(ProcessSignal::Terminate)
    }

    /// Kill the child process (SIGKILL).
    ///
    /// # Errors
    ///
    /// See [`signal`](Self::signal).
    pub fn kill(&self) -> Result<()> {
        self.signal(ProcessSignal::Kill)
    }
}

/// Owning handle for a child spawned with piped stdio.
pub struct PipeChild {
    /// The underlying tokio child process.
    child: TokioChild,
    /// Shared view handed out to observers.
    handle: ProcessHandle,
    /// Cached exit status.
    exit_status: Option<ExitStatus>,
}

impl std::fmt::Debug for PipeChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeChild")
            .field("pid", &self.handle.pid)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

impl PipeChild {
    fn new(child: TokioChild) -> Result<Self> {
        let pid = child.id().ok_or_else(|| {
            PipeError::Spawn(io::Error::other("child exited before its pid was read"))
        })?;
        Ok(Self {
            child,
            handle: ProcessHandle {
                pid,
                running: Arc::new(AtomicBool::new(true)),
            },
            exit_status: None,
        })
    }

    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.handle.pid
    }

    /// Get a cloneable handle for observers.
    #[must_use]
    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    /// Check if the process is still running (as last observed).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Wait for the child process to exit.
    ///
    /// Cancel safe; once resolved the status is cached.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::Wait`] if waiting fails.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let status = self.child.wait().await.map_err(PipeError::Wait)?;
        Ok(self.record_exit(status))
    }

    /// Try to get the exit status without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::Wait`] if the status cannot be queried.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }

        match self.child.try_wait().map_err(PipeError::Wait)? {
            Some(status) => Ok(Some(self.record_exit(status))),
            None => Ok(None),
        }
    }

    fn record_exit(&mut self, status: StdExitStatus) -> ExitStatus {
        let exit_status = convert_exit_status(status);
        self.handle.running.store(false, Ordering::SeqCst);
        self.exit_status = Some(exit_status);
        tracing::debug!(pid = self.handle.pid, status = %exit_status, "child exited");
        exit_status
    }
}

/// A freshly spawned child with its stdin writer and merged output reader.
#[derive(Debug)]
pub struct SpawnedChild {
    /// The owning child handle.
    pub child: PipeChild,
    /// Write end of the child's stdin pipe.
    pub stdin: ChildStdin,
    /// Read end of the child's combined stdout/stderr pipe.
    pub output: MergedOutput,
}

/// Spawn `program` with stdout and stderr merged into one pipe.
///
/// Must be called from within a Tokio runtime. The parent's copies of the
/// output write end are closed before returning, so the reader observes
/// end-of-file once the child (and anything it forked) closes its stdio.
///
/// # Errors
///
/// Returns [`PipeError::Create`] if a pipe cannot be created and
/// [`PipeError::Spawn`] if the process cannot be started.
pub fn spawn_piped<S, I>(program: S, args: I, config: &SpawnConfig) -> Result<SpawnedChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let (output, write_fd) = MergedOutput::open()?;
    let stderr_fd = write_fd.try_clone().map_err(PipeError::Create)?;

    let mut child = {
        let mut cmd = Command::new(program.as_ref());
        cmd.args(args);
        cmd.env_clear();
        cmd.envs(config.effective_env());

        if let Some(ref dir) = config.working_directory {
            cmd.current_dir(dir);
        }

        if config.new_process_group {
            cmd.process_group(0);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::from(write_fd));
        cmd.stderr(Stdio::from(stderr_fd));

        // `cmd` drops at the end of this block, closing the parent's write ends.
        cmd.spawn().map_err(PipeError::Spawn)?
    };

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| PipeError::Spawn(io::Error::other("child stdin was not captured")))?;

    let child = PipeChild::new(child)?;
    tracing::debug!(pid = child.pid(), "spawned piped child");

    Ok(SpawnedChild {
        child,
        stdin,
        output,
    })
}

/// Convert `std::process::ExitStatus` to our `ExitStatus`.
fn convert_exit_status(status: StdExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        ExitStatus::Exited(code)
    } else if let Some(signal) = status.signal() {
        ExitStatus::Signaled(signal)
    } else {
        ExitStatus::Exited(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unix::pipe::ReadOutcome;
    use tokio::io::AsyncWriteExt;

    async fn collect_output(output: &MergedOutput) -> Vec<u8> {
        let mut collected = Vec::new();
        while let ReadOutcome::Data(bytes) = output.read_available(1024).await.unwrap() {
            collected.extend_from_slice(&bytes);
        }
        collected
    }

    #[test]
    fn exit_status_helpers() {
        assert!(ExitStatus::Exited(0).success());
        assert!(!ExitStatus::Exited(1).success());
        assert_eq!(ExitStatus::Signaled(9).code(), None);
        assert_eq!(ExitStatus::Exited(3).to_string(), "exit code 3");
    }

    #[tokio::test]
    async fn stdout_and_stderr_share_one_pipe() {
        let spawned = spawn_piped(
            "/bin/sh",
            ["-c", "echo out; echo err 1>&2; echo done"],
            &SpawnConfig::default(),
        )
        .unwrap();
        let SpawnedChild {
            mut child, output, ..
        } = spawned;

        let collected = collect_output(&output).await;
        assert_eq!(String::from_utf8(collected).unwrap(), "out\nerr\ndone\n");
        assert_eq!(child.wait().await.unwrap(), ExitStatus::Exited(0));
        assert!(!child.is_running());
    }

    #[tokio::test]
    async fn stdin_reaches_child() {
        let SpawnedChild {
            mut child,
            mut stdin,
            output,
        } = spawn_piped("/bin/sh", ["-c", "read line; echo got:$line"], &SpawnConfig::default())
            .unwrap();

        stdin.write_all(b"ping\n").await.unwrap();
        drop(stdin);

        let collected = collect_output(&output).await;
        assert_eq!(String::from_utf8(collected).unwrap(), "got:ping\n");
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn handle_kills_running_child() {
        let SpawnedChild { mut child, .. } =
            spawn_piped("/bin/sh", ["-c", "exec sleep 30"], &SpawnConfig::default()).unwrap();
        let handle = child.handle();
        assert!(handle.is_running());

        handle.kill().unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status, ExitStatus::Signaled(libc::SIGKILL));
        assert!(!handle.is_running());
        assert!(matches!(handle.kill(), Err(PipeError::NotRunning { .. })));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let result = spawn_piped(
            "/nonexistent/definitely-not-here",
            std::iter::empty::<&str>(),
            &SpawnConfig::default(),
        );
        assert!(matches!(result, Err(PipeError::Spawn(_))));
    }

    #[tokio::test]
    async fn working_directory_and_env_are_applied() {
        let config = SpawnConfig::builder()
            .working_directory("/")
            .env("RUST_PIPE_TEST", "value")
            .build();
        let SpawnedChild {
            mut child, output, ..
        } = spawn_piped("/bin/sh", ["-c", "pwd; echo $RUST_PIPE_TEST"], &config).unwrap();

        let collected = collect_output(&output).await;
        assert_eq!(String::from_utf8(collected).unwrap(), "/\nvalue\n");
        child.wait().await.unwrap();
    }
}
