//! Small process-related helpers shared across the workspace.
//!
//! Long-running children are handed to a waiter task right after spawning.
//! The waiter owns the [`tokio::process::Child`], reaps it when it exits and
//! kills it when asked to, so callers only ever hold a [`ProcessWaiter`].

use std::ffi::OsStr;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` for a supervised child.
///
/// The command gets `CREATE_NO_WINDOW` on Windows and `kill_on_drop`, so a
/// child can never outlive the handle that spawned it.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd.kill_on_drop(true);
    cmd
}

/// How a supervised child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited on its own. `None` when it was ended by a signal.
    Exited(Option<i32>),
    /// The process was killed on request.
    Killed,
    /// Waiting on the process failed; its state is unknown.
    WaitFailed,
}

impl ProcessExit {
    /// Whether the process ended on its own with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(Some(0)))
    }
}

impl std::fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(Some(code)) => write!(f, "exited with code {}", code),
            Self::Exited(None) => write!(f, "terminated by signal"),
            Self::Killed => write!(f, "killed"),
            Self::WaitFailed => write!(f, "wait failed"),
        }
    }
}

/// Handle to a child process owned by a background waiter task.
///
/// Dropping the handle kills the child.
#[derive(Debug)]
pub struct ProcessWaiter {
    pid: Option<u32>,
    cancellation_token: CancellationToken,
    exit_rx: oneshot::Receiver<ProcessExit>,
    exit: Option<ProcessExit>,
}

/// Hand `child` to a waiter task and return its handle.
pub fn spawn_process_waiter(mut child: Child) -> ProcessWaiter {
    let pid = child.id();
    let cancellation_token = CancellationToken::new();
    let (tx, exit_rx) = oneshot::channel();

    let token = cancellation_token.clone();
    tokio::spawn(async move {
        let exit = tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!(pid = ?pid, "Failed to kill process: {}", e);
                    ProcessExit::WaitFailed
                } else {
                    ProcessExit::Killed
                }
            }
            status = child.wait() => {
                match status {
                    Ok(exit_status) => ProcessExit::Exited(exit_status.code()),
                    Err(e) => {
                        error!(pid = ?pid, "Error waiting for process: {}", e);
                        ProcessExit::WaitFailed
                    }
                }
            }
        };
        let _ = tx.send(exit);
    });

    ProcessWaiter {
        pid,
        cancellation_token,
        exit_rx,
        exit: None,
    }
}

impl ProcessWaiter {
    /// OS process id, if the child was still running when spawned.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking check for process exit.
    ///
    /// Returns `Some` once the child has ended, and keeps returning the same
    /// value afterwards.
    pub fn try_exit(&mut self) -> Option<ProcessExit> {
        if self.exit.is_none() {
            match self.exit_rx.try_recv() {
                Ok(exit) => self.exit = Some(exit),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => self.exit = Some(ProcessExit::WaitFailed),
            }
        }
        self.exit
    }

    /// Kill the child and wait up to `timeout` for the waiter to reap it.
    ///
    /// Returns `None` if the child was not reaped in time. If the child had
    /// already exited, its original exit is returned.
    pub async fn terminate(&mut self, timeout: Duration) -> Option<ProcessExit> {
        if let Some(exit) = self.try_exit() {
            return Some(exit);
        }

        self.cancellation_token.cancel();
        let exit = match tokio::time::timeout(timeout, &mut self.exit_rx).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(_)) => Some(ProcessExit::WaitFailed),
            Err(_) => None,
        };
        self.exit = exit;
        exit
    }
}

impl Drop for ProcessWaiter {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
