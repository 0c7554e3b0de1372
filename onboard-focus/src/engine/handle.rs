//! Handle for talking to the focus actor.

use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot, watch};

use super::actor::FocusCommand;
use crate::domain::{RotationPlan, SourcePath, SyncOutcome};
use crate::{Error, Result};

/// Default mailbox capacity for the focus actor.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default timeout for enqueueing a command when the mailbox is full.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Point-in-time copy of the engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusSnapshot {
    pub focus: Option<String>,
    pub candidates: Vec<String>,
}

/// Cloneable handle to the focus actor.
///
/// Mutating operations are queued on the actor's mailbox and run one at a
/// time. [`focus_name`](Self::focus_name) reads the last committed value
/// without touching the mailbox.
#[derive(Clone)]
pub struct FocusHandle {
    sender: mpsc::Sender<FocusCommand>,
    focus_rx: watch::Receiver<Option<String>>,
    send_timeout: Duration,
}

impl FocusHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<FocusCommand>,
        focus_rx: watch::Receiver<Option<String>>,
    ) -> Self {
        Self {
            sender,
            focus_rx,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Reconcile the candidate set with one discovery result.
    pub async fn sync_membership(&self, paths: Vec<SourcePath>) -> Result<SyncOutcome> {
        self.request(|reply| FocusCommand::Sync { paths, reply })
            .await
    }

    /// Run one rotation, including its notifications.
    pub async fn rotate_focus(&self) -> Result<RotationPlan> {
        self.request(|reply| FocusCommand::Rotate { reply }).await
    }

    /// Current focus and candidate set.
    pub async fn snapshot(&self) -> Result<FocusSnapshot> {
        self.request(|reply| FocusCommand::Snapshot { reply }).await
    }

    /// Last committed focus.
    pub fn focus(&self) -> Option<String> {
        self.focus_rx.borrow().clone()
    }

    /// Last committed focus name, or an empty string.
    pub fn focus_name(&self) -> String {
        self.focus().unwrap_or_default()
    }

    /// Receiver notified on every focus change.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.focus_rx.clone()
    }

    /// Whether the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        make_command: impl FnOnce(oneshot::Sender<T>) -> FocusCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send_timeout(make_command(reply), self.send_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    Error::Timeout("focus engine mailbox is full".to_string())
                }
                SendTimeoutError::Closed(_) => Error::EngineStopped,
            })?;

        response.await.map_err(|_| Error::EngineStopped)
    }
}
