//! The actor owning [`FocusState`].

use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::handle::{FocusHandle, FocusSnapshot};
use super::notifier::FocusNotifier;
use crate::domain::{FocusState, RotationPlan, SourcePath, SyncOutcome};

/// Messages accepted by the focus actor.
pub(crate) enum FocusCommand {
    Sync {
        paths: Vec<SourcePath>,
        reply: oneshot::Sender<SyncOutcome>,
    },
    Rotate {
        reply: oneshot::Sender<RotationPlan>,
    },
    Snapshot {
        reply: oneshot::Sender<FocusSnapshot>,
    },
}

pub(crate) struct FocusActor {
    state: FocusState,
    rng: StdRng,
    notifier: FocusNotifier,
    focus_tx: watch::Sender<Option<String>>,
    mailbox: mpsc::Receiver<FocusCommand>,
    cancellation_token: CancellationToken,
}

impl FocusActor {
    /// Spawn the actor and return a handle to it.
    pub(crate) fn spawn(
        notifier: FocusNotifier,
        rng: StdRng,
        mailbox_capacity: usize,
        cancellation_token: CancellationToken,
    ) -> (FocusHandle, JoinHandle<()>) {
        let (sender, mailbox) = mpsc::channel(mailbox_capacity.max(1));
        let (focus_tx, focus_rx) = watch::channel(None);

        let actor = Self {
            state: FocusState::new(),
            rng,
            notifier,
            focus_tx,
            mailbox,
            cancellation_token,
        };
        let task = tokio::spawn(actor.run());

        (FocusHandle::new(sender, focus_rx), task)
    }

    async fn run(mut self) {
        debug!("Focus actor started");

        loop {
            let command = tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => break,
                command = self.mailbox.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            self.handle(command).await;
        }

        debug!(
            candidates = self.state.len(),
            focus = ?self.state.focus(),
            "Focus actor stopped"
        );
    }

    async fn handle(&mut self, command: FocusCommand) {
        match command {
            FocusCommand::Sync { paths, reply } => {
                let outcome = self.sync_membership(&paths);
                let _ = reply.send(outcome);
            }
            FocusCommand::Rotate { reply } => {
                let plan = self.rotate_focus().await;
                let _ = reply.send(plan);
            }
            FocusCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn sync_membership(&mut self, paths: &[SourcePath]) -> SyncOutcome {
        let outcome = self.state.sync_membership(paths, &mut self.rng);

        if !outcome.added.is_empty() || !outcome.removed.is_empty() {
            debug!(
                added = ?outcome.added,
                removed = ?outcome.removed,
                candidates = self.state.len(),
                "Candidate set changed"
            );
        }

        if outcome.focus_lost() {
            info!(
                previous = ?outcome.previous,
                focus = ?outcome.focus,
                "Focused stream went offline, picked a replacement"
            );
        } else if outcome.focus_changed() {
            info!(focus = ?outcome.focus, "Focus assigned");
        }

        self.publish();
        outcome
    }

    /// Plan, announce, then commit. The mailbox is not drained while the
    /// announcements are in flight, so no sync can interleave.
    async fn rotate_focus(&mut self) -> RotationPlan {
        let plan = self.state.plan_rotation(&mut self.rng);

        match &plan {
            RotationPlan::Idle => debug!("No candidates, skipping rotation"),
            RotationPlan::Single => debug!("Single candidate, keeping focus"),
            RotationPlan::Initial(to) => info!(focus = %to, "Focus assigned by rotation"),
            RotationPlan::Switch { from, to } => {
                info!(from = %from, to = %to, "Rotating focus");
                self.notifier.announce_switch(from, to).await;
            }
        }

        if self.state.commit_rotation(&plan) {
            self.publish();
        }

        plan
    }

    fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot {
            focus: self.state.focus().map(str::to_string),
            candidates: self.state.candidates().map(str::to_string).collect(),
        }
    }

    fn publish(&self) {
        let focus = self.state.focus().map(str::to_string);
        self.focus_tx.send_if_modified(|current| {
            if *current != focus {
                *current = focus;
                true
            } else {
                false
            }
        });
    }
}
