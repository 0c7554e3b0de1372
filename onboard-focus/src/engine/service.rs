//! Engine lifecycle and polling loops.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::actor::FocusActor;
use super::handle::{DEFAULT_MAILBOX_CAPACITY, FocusHandle};
use super::notifier::FocusNotifier;
use crate::discovery::SourceDiscovery;
use crate::domain::{RotationPlan, SyncOutcome};

/// Default membership sync interval.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3);

/// Default focus rotation interval.
pub const DEFAULT_ROTATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Timing configuration for the engine loops.
#[derive(Debug, Clone)]
pub struct FocusEngineConfig {
    /// Fine timer: how often the candidate set is reconciled.
    pub sync_interval: Duration,
    /// Coarse timer: how often focus rotates.
    pub rotate_interval: Duration,
    /// Actor mailbox capacity.
    pub mailbox_capacity: usize,
}

impl Default for FocusEngineConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            rotate_interval: DEFAULT_ROTATE_INTERVAL,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// A running engine: the focus actor plus its two timer loops.
pub struct FocusEngine {
    handle: FocusHandle,
    tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl FocusEngine {
    /// Spawn the actor and both loops. They run until `cancellation_token`
    /// is cancelled.
    pub fn start(
        config: FocusEngineConfig,
        discovery: Arc<dyn SourceDiscovery>,
        notifier: FocusNotifier,
        rng: StdRng,
        cancellation_token: CancellationToken,
    ) -> Self {
        let (handle, actor_task) = FocusActor::spawn(
            notifier,
            rng,
            config.mailbox_capacity,
            cancellation_token.clone(),
        );

        let sync_task = tokio::spawn(run_sync_loop(
            handle.clone(),
            discovery,
            config.sync_interval,
            cancellation_token.clone(),
        ));
        let rotate_task = tokio::spawn(run_rotation_loop(
            handle.clone(),
            config.rotate_interval,
            cancellation_token.clone(),
        ));

        info!(
            sync_interval = ?config.sync_interval,
            rotate_interval = ?config.rotate_interval,
            "Focus engine started"
        );

        Self {
            handle,
            tasks: vec![actor_task, sync_task, rotate_task],
            cancellation_token,
        }
    }

    pub fn handle(&self) -> FocusHandle {
        self.handle.clone()
    }

    /// Cancel the loops and wait for them to finish.
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Focus engine task ended abnormally: {}", e);
            }
        }
        info!("Focus engine stopped");
    }
}

/// Spawn only the focus actor, without timer loops. The caller drives
/// membership sync and rotation through the returned handle.
pub fn spawn_focus_actor(
    notifier: FocusNotifier,
    rng: StdRng,
    cancellation_token: CancellationToken,
) -> (FocusHandle, JoinHandle<()>) {
    FocusActor::spawn(notifier, rng, DEFAULT_MAILBOX_CAPACITY, cancellation_token)
}

/// Run one membership sync: poll discovery and hand the result to the
/// actor. A failed poll leaves the state untouched.
pub async fn sync_once(discovery: &dyn SourceDiscovery, handle: &FocusHandle) -> Option<SyncOutcome> {
    let paths = match discovery.list_paths().await {
        Ok(paths) => paths,
        Err(e) if e.is_transient() => {
            warn!("Discovery poll failed, skipping membership sync: {}", e);
            return None;
        }
        Err(e) => {
            error!("Discovery returned an unusable result, skipping membership sync: {}", e);
            return None;
        }
    };

    match handle.sync_membership(paths).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Membership sync rejected: {}", e);
            None
        }
    }
}

async fn run_sync_loop(
    handle: FocusHandle,
    discovery: Arc<dyn SourceDiscovery>,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        sync_once(discovery.as_ref(), &handle).await;
    }

    debug!("Membership sync loop stopped");
}

async fn run_rotation_loop(
    handle: FocusHandle,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    // First rotation happens one full interval after startup.
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match handle.rotate_focus().await {
            Ok(RotationPlan::Switch { from, to }) => {
                debug!(from = %from, to = %to, "Rotation committed");
            }
            Ok(_) => {}
            Err(e) => warn!("Focus rotation failed: {}", e),
        }
    }

    debug!("Rotation loop stopped");
}
