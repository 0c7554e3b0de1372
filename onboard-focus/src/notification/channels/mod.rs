//! Notification channels.
//!
//! - Slack (`chat.postMessage` to a fixed channel)
//! - Generic webhooks (HTTP POST of the event as JSON)

mod slack;
mod webhook;

pub use slack::{SlackChannel, SlackConfig};
pub use webhook::{WebhookAuth, WebhookChannel, WebhookConfig};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::events::FocusEvent;
use crate::Result;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool;

    /// Send a notification through this channel.
    async fn send(&self, event: &FocusEvent) -> Result<()>;
}

/// Channel configuration wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelConfig {
    /// Slack Web API channel.
    Slack(SlackConfig),
    /// Generic webhook channel.
    Webhook(WebhookConfig),
}

impl ChannelConfig {
    /// Get the channel type name.
    pub fn channel_type(&self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Webhook(_) => "webhook",
        }
    }

    /// Check if the channel is enabled.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Slack(c) => c.enabled,
            Self::Webhook(c) => c.enabled,
        }
    }

    /// Instantiate the channel.
    pub fn build(self) -> Arc<dyn NotificationChannel> {
        match self {
            Self::Slack(c) => Arc::new(SlackChannel::new(c)),
            Self::Webhook(c) => Arc::new(WebhookChannel::new(c)),
        }
    }
}
