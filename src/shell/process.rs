//! Handle to a spawned, process-group isolated child.

use std::process::ExitStatus;
use std::time::Duration;

#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tracing::debug;

use super::DeadlineToken;
use crate::error::{ExecutionError, InstallError};

/// Time between SIGTERM and SIGKILL when tearing down a process group.
const TERM_GRACE: Duration = Duration::from_millis(500);

pub struct ProcessHandle {
    command: String,
    child: Child,
}

impl ProcessHandle {
    pub(crate) fn new(command: &str, child: Child) -> Self {
        Self {
            command: command.to_string(),
            child,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for exit, or tear the process group down when the scope fires.
    pub async fn wait(&mut self, scope: &DeadlineToken) -> Result<ExitStatus, InstallError> {
        tokio::select! {
            biased;
            status = self.child.wait() => status.map_err(|source| {
                ExecutionError::Io {
                    command: self.command.clone(),
                    source,
                }
                .into()
            }),
            _ = scope.token().cancelled() => {
                self.terminate().await;
                if scope.expired() {
                    Err(ExecutionError::TimedOut {
                        command: self.command.clone(),
                        timeout: scope.timeout(),
                    }
                    .into())
                } else {
                    Err(InstallError::Cancelled)
                }
            }
        }
    }

    /// Terminate the child and, on Unix, every process in its group.
    pub async fn terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            let pgid = Pid::from_raw(pid as i32);
            if let Err(e) = killpg(pgid, Signal::SIGTERM) {
                debug!("SIGTERM to process group {} failed: {}", pid, e);
            }
            if tokio::time::timeout(TERM_GRACE, self.child.wait()).await.is_err() {
                debug!("process group {} ignored SIGTERM", pid);
            }
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                debug!("SIGKILL to process group {} failed: {}", pid, e);
            }
        }

        if let Err(e) = self.child.kill().await {
            debug!("kill '{}' failed: {}", self.command, e);
        }
    }
}
