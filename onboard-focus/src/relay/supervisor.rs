//! Relay supervisor state machine.
//!
//! Each tick compares the current focus with the target of the running
//! relay. On a change the old relay is terminated before the new one is
//! started, so two relays never publish to the destination at once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::RelayTarget;
use super::process::{RelayChild, RelayLauncher};
use super::source::FocusSource;

/// Default focus poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default delay before the first tick, giving the engine time to discover
/// sources.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// What the supervisor is currently relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    RelayingPlaceholder,
    RelayingSource(String),
}

impl RelayState {
    fn for_target(target: &RelayTarget) -> Self {
        match target {
            RelayTarget::Placeholder => Self::RelayingPlaceholder,
            RelayTarget::Source(name) => Self::RelayingSource(name.clone()),
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RelayingPlaceholder => write!(f, "relaying placeholder"),
            Self::RelayingSource(name) => write!(f, "relaying {}", name),
        }
    }
}

/// Backoff between relaunches of the same target after a launch failure
/// or an unexpected exit.
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    /// Delay after the second consecutive failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Whether to add up to 25% jitter.
    pub use_jitter: bool,
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RestartBackoff {
    /// Delay before relaunch attempt `attempt` (0 = immediately).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = base.min(self.max_delay.as_millis() as f64) as u64;

        let delay_ms = if self.use_jitter {
            delay_ms + (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// Supervisor timing configuration.
#[derive(Debug, Clone)]
pub struct RelaySupervisorConfig {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub backoff: RestartBackoff,
}

impl Default for RelaySupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            backoff: RestartBackoff::default(),
        }
    }
}

/// Result of one supervisor tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The focus could not be read; nothing was touched.
    FocusUnavailable,
    /// The running relay already matches the focus.
    Unchanged(RelayTarget),
    /// A relay was started with nothing running before.
    Started(RelayTarget),
    /// The running relay was replaced.
    Switched { from: RelayTarget, to: RelayTarget },
    /// The relay had exited on its own and was relaunched.
    Restarted(RelayTarget),
    /// Launching failed; the supervisor is idle.
    LaunchFailed(RelayTarget),
    /// A recent failure for this target has not cooled down yet.
    BackingOff(RelayTarget),
}

#[derive(Debug)]
struct LaunchFailure {
    target: RelayTarget,
    attempts: u32,
    retry_at: Instant,
}

/// Keeps one relay pointed at the current focus.
pub struct RelaySupervisor {
    source: Arc<dyn FocusSource>,
    launcher: Arc<dyn RelayLauncher>,
    config: RelaySupervisorConfig,
    current: Option<Box<dyn RelayChild>>,
    state: RelayState,
    last_failure: Option<LaunchFailure>,
}

impl RelaySupervisor {
    pub fn new(
        source: Arc<dyn FocusSource>,
        launcher: Arc<dyn RelayLauncher>,
        config: RelaySupervisorConfig,
    ) -> Self {
        Self {
            source,
            launcher,
            config,
            current: None,
            state: RelayState::Idle,
            last_failure: None,
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn current_target(&self) -> Option<&RelayTarget> {
        self.current.as_ref().map(|child| child.target())
    }

    /// Read the focus once and reconcile the relay with it.
    pub async fn tick(&mut self) -> TickOutcome {
        let focus = match self.source.current_focus().await {
            Ok(focus) => focus,
            Err(e) => {
                warn!("Failed to read focus, keeping current relay: {}", e);
                return TickOutcome::FocusUnavailable;
            }
        };

        self.reconcile(RelayTarget::from_focus(&focus)).await
    }

    /// Make the running relay match `desired`.
    pub async fn reconcile(&mut self, desired: RelayTarget) -> TickOutcome {
        let mut restarting = false;

        if let Some(current) = self.current.as_mut()
            && current.target() == &desired
        {
            if !current.has_exited() {
                self.last_failure = None;
                return TickOutcome::Unchanged(desired);
            }

            warn!(target = %desired, "Relay exited unexpectedly");
            self.stop_current().await;
            self.record_failure(&desired);
            restarting = true;
        }

        if self.in_backoff(&desired) {
            debug!(target = %desired, "Relay relaunch is backing off");
            return TickOutcome::BackingOff(desired);
        }

        let previous = self.stop_current().await;

        match self.launcher.launch(&desired).await {
            Ok(child) => {
                self.current = Some(child);
                self.state = RelayState::for_target(&desired);
                info!(target = %desired, "Relay running");

                if restarting {
                    TickOutcome::Restarted(desired)
                } else {
                    match previous {
                        Some(from) => TickOutcome::Switched { from, to: desired },
                        None => TickOutcome::Started(desired),
                    }
                }
            }
            Err(e) => {
                error!(target = %desired, "Failed to launch relay: {}", e);
                self.record_failure(&desired);
                TickOutcome::LaunchFailed(desired)
            }
        }
    }

    /// Tick on the configured interval until cancelled, then stop the relay.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        info!(
            poll_interval = ?self.config.poll_interval,
            settle_delay = ?self.config.settle_delay,
            "Relay supervisor started"
        );

        tokio::select! {
            biased;

            _ = cancellation_token.cancelled() => {
                self.shutdown().await;
                return;
            }
            _ = tokio::time::sleep(self.config.settle_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = self.tick().await;
            if !matches!(outcome, TickOutcome::Unchanged(_)) {
                debug!(state = %self.state, "Relay tick: {:?}", outcome);
            }
        }

        self.shutdown().await;
    }

    /// Terminate the running relay, if any.
    pub async fn shutdown(&mut self) {
        if let Some(target) = self.stop_current().await {
            info!(target = %target, "Relay stopped");
        }
    }

    async fn stop_current(&mut self) -> Option<RelayTarget> {
        let mut child = self.current.take()?;
        let target = child.target().clone();

        if let Err(e) = child.terminate().await {
            warn!(target = %target, "Relay did not stop cleanly: {}", e);
        }
        self.state = RelayState::Idle;

        Some(target)
    }

    fn record_failure(&mut self, target: &RelayTarget) {
        let attempts = match &self.last_failure {
            Some(failure) if &failure.target == target => failure.attempts + 1,
            _ => 1,
        };
        let delay = self.config.backoff.delay_for_attempt(attempts - 1);

        self.last_failure = Some(LaunchFailure {
            target: target.clone(),
            attempts,
            retry_at: Instant::now() + delay,
        });
    }

    fn in_backoff(&self, target: &RelayTarget) -> bool {
        self.last_failure
            .as_ref()
            .is_some_and(|failure| &failure.target == target && Instant::now() < failure.retry_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> RestartBackoff {
        RestartBackoff {
            use_jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_delays() {
        let backoff = backoff();
        assert_eq!(backoff.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let backoff = RestartBackoff::default();
        for _ in 0..20 {
            let delay = backoff.delay_for_attempt(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_state_for_target() {
        assert_eq!(
            RelayState::for_target(&RelayTarget::Placeholder),
            RelayState::RelayingPlaceholder
        );
        assert_eq!(
            RelayState::for_target(&RelayTarget::Source("a".to_string())).to_string(),
            "relaying a"
        );
    }
}
