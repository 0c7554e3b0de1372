//! Notification events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::owners::StreamOwner;

/// A focus change as seen by one stream owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FocusEvent {
    /// The owner's stream left focus.
    FocusLost {
        stream_key: String,
        slack_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The owner's stream entered focus.
    FocusGained {
        stream_key: String,
        slack_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl FocusEvent {
    pub fn lost(owner: &StreamOwner) -> Self {
        Self::FocusLost {
            stream_key: owner.key.clone(),
            slack_id: owner.slack_id.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn gained(owner: &StreamOwner) -> Self {
        Self::FocusGained {
            stream_key: owner.key.clone(),
            slack_id: owner.slack_id.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FocusLost { .. } => "focus_lost",
            Self::FocusGained { .. } => "focus_gained",
        }
    }

    pub fn stream_key(&self) -> &str {
        match self {
            Self::FocusLost { stream_key, .. } | Self::FocusGained { stream_key, .. } => stream_key,
        }
    }

    pub fn slack_id(&self) -> &str {
        match self {
            Self::FocusLost { slack_id, .. } | Self::FocusGained { slack_id, .. } => slack_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::FocusLost { timestamp, .. } | Self::FocusGained { timestamp, .. } => *timestamp,
        }
    }

    /// Chat message text, mentioning the owner.
    pub fn message(&self) -> String {
        match self {
            Self::FocusLost { slack_id, .. } => {
                format!("Hey <@{}>, you're no longer in focus!", slack_id)
            }
            Self::FocusGained { slack_id, .. } => format!(
                "Hey <@{}>, you're in focus! Make sure to tell us what you're working on!",
                slack_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_mention_owner() {
        let owner = StreamOwner::new("key", "U42");

        let lost = FocusEvent::lost(&owner);
        assert_eq!(lost.message(), "Hey <@U42>, you're no longer in focus!");
        assert_eq!(lost.event_type(), "focus_lost");

        let gained = FocusEvent::gained(&owner);
        assert!(gained.message().starts_with("Hey <@U42>, you're in focus!"));
        assert_eq!(gained.stream_key(), "key");
    }

    #[test]
    fn test_serialized_shape() {
        let event = FocusEvent::gained(&StreamOwner::new("key", "U42"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "focus_gained");
        assert_eq!(json["stream_key"], "key");
        assert_eq!(json["slack_id"], "U42");
    }
}
