//! Notification fan-out.

use std::sync::Arc;

use tracing::{debug, warn};

use super::channels::{ChannelConfig, NotificationChannel};
use super::events::FocusEvent;

/// Per-event delivery summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}

/// Sends each event to every enabled channel.
#[derive(Clone, Default)]
pub struct NotificationService {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from channel configs, skipping disabled ones.
    pub fn from_configs(configs: impl IntoIterator<Item = ChannelConfig>) -> Self {
        let mut service = Self::new();
        for config in configs {
            if config.is_enabled() {
                debug!("Enabling {} notification channel", config.channel_type());
                service.add_channel(config.build());
            }
        }
        service
    }

    pub fn add_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        self.channels.push(channel);
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.add_channel(channel);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver `event` to every enabled channel, in order.
    ///
    /// Failures are logged and counted; they never stop delivery to the
    /// remaining channels.
    pub async fn dispatch(&self, event: &FocusEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in self.channels.iter().filter(|c| c.is_enabled()) {
            match channel.send(event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        channel = channel.channel_type(),
                        event = event.event_type(),
                        stream_key = %event.stream_key(),
                        "Failed to deliver notification: {}",
                        e
                    );
                }
            }
        }

        report
    }
}
