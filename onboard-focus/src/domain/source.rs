//! Inbound source paths as reported by the media server.

use serde::{Deserialize, Serialize};

/// One inbound media source, refreshed on every discovery poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePath {
    /// Path name on the media server; also the stream key.
    pub name: String,
    /// Whether the path is currently delivering media.
    #[serde(default)]
    pub ready: bool,
}

impl SourcePath {
    pub fn new(name: impl Into<String>, ready: bool) -> Self {
        Self {
            name: name.into(),
            ready,
        }
    }

    pub fn ready(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn idle(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }
}
