//! Focus-change announcements.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::notification::{FocusEvent, NotificationService};
use crate::owners::{OwnerDirectory, StaticOwnerDirectory, StreamOwner};

/// Default bound on each owner lookup and each dispatch.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves owners and announces focus switches to them.
///
/// Every failure is logged and swallowed: a rotation must commit whether or
/// not anyone heard about it.
#[derive(Clone)]
pub struct FocusNotifier {
    owners: Arc<dyn OwnerDirectory>,
    notifications: NotificationService,
    timeout: Duration,
}

impl FocusNotifier {
    pub fn new(owners: Arc<dyn OwnerDirectory>, notifications: NotificationService) -> Self {
        Self {
            owners,
            notifications,
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// A notifier with no owners and no channels.
    pub fn disabled() -> Self {
        Self::new(
            Arc::new(StaticOwnerDirectory::new()),
            NotificationService::new(),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tell the old owner they lost focus, then the new owner they gained it.
    pub async fn announce_switch(&self, from: &str, to: &str) {
        if self.notifications.is_empty() {
            debug!("No notification channels configured, focus switch not announced");
            return;
        }

        self.announce(from, FocusEvent::lost).await;
        self.announce(to, FocusEvent::gained).await;
    }

    async fn announce(&self, stream_key: &str, make_event: fn(&StreamOwner) -> FocusEvent) {
        let owner = match tokio::time::timeout(self.timeout, self.owners.owner_of(stream_key)).await
        {
            Ok(Ok(owner)) => owner,
            Ok(Err(e)) => {
                warn!(
                    stream_key = %stream_key,
                    "Could not resolve stream owner, skipping notification: {}",
                    e
                );
                return;
            }
            Err(_) => {
                warn!(stream_key = %stream_key, "Stream owner lookup timed out");
                return;
            }
        };

        let event = make_event(&owner);
        match tokio::time::timeout(self.timeout, self.notifications.dispatch(&event)).await {
            Ok(report) => debug!(
                stream_key = %stream_key,
                event = event.event_type(),
                delivered = report.delivered,
                failed = report.failed,
                "Focus notification dispatched"
            ),
            Err(_) => warn!(
                stream_key = %stream_key,
                event = event.event_type(),
                "Focus notification timed out"
            ),
        }
    }
}
