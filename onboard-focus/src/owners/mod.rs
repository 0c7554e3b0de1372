//! Stream owner lookup.
//!
//! Maps a stream key (the MediaMTX path name) to the person streaming on
//! it, for focus-change notifications and the stream-key read endpoint.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

/// The person behind a stream key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOwner {
    /// Stream key; filled from the directory key when loading a file.
    #[serde(default)]
    pub key: String,
    /// Slack member id used for mentions.
    pub slack_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StreamOwner {
    pub fn new(key: impl Into<String>, slack_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            slack_id: slack_id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Resolves stream keys to owners.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// Look up the owner of `stream_key`.
    async fn owner_of(&self, stream_key: &str) -> Result<StreamOwner>;

    /// Every known stream key, sorted.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Owner directory held in memory, optionally loaded from a JSON file of
/// the form `{"<stream key>": {"slack_id": "U123", "name": "Ada"}}`.
#[derive(Debug, Clone, Default)]
pub struct StaticOwnerDirectory {
    owners: HashMap<String, StreamOwner>,
}

impl StaticOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, StreamOwner> = serde_json::from_str(json)?;
        Ok(raw.into_iter().collect())
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "failed to read owners file {}: {}",
                path.display(),
                e
            ))
        })?;
        let directory = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            owners = directory.len(),
            "Loaded stream owner directory"
        );
        Ok(directory)
    }

    pub fn insert(&mut self, owner: StreamOwner) {
        self.owners.insert(owner.key.clone(), owner);
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl FromIterator<(String, StreamOwner)> for StaticOwnerDirectory {
    fn from_iter<T: IntoIterator<Item = (String, StreamOwner)>>(iter: T) -> Self {
        let owners = iter
            .into_iter()
            .map(|(key, mut owner)| {
                owner.key = key.clone();
                (key, owner)
            })
            .collect();
        Self { owners }
    }
}

#[async_trait]
impl OwnerDirectory for StaticOwnerDirectory {
    async fn owner_of(&self, stream_key: &str) -> Result<StreamOwner> {
        self.owners
            .get(stream_key)
            .cloned()
            .ok_or_else(|| Error::not_found("stream owner", stream_key))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.owners.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const OWNERS: &str = r#"{
        "k2": {"slack_id": "U2"},
        "k1": {"slack_id": "U1", "name": "Ada"}
    }"#;

    #[tokio::test]
    async fn test_lookup_fills_key_from_map() {
        let directory = StaticOwnerDirectory::from_json(OWNERS).unwrap();

        let owner = directory.owner_of("k1").await.unwrap();
        assert_eq!(owner, StreamOwner::new("k1", "U1").with_name("Ada"));
        assert_eq!(directory.keys().await.unwrap(), vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let directory = StaticOwnerDirectory::new();
        let err = directory.owner_of("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(OWNERS.as_bytes()).unwrap();

        let directory = StaticOwnerDirectory::from_file(file.path()).await.unwrap();
        assert_eq!(directory.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let err = StaticOwnerDirectory::from_file("/nonexistent/owners.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(StaticOwnerDirectory::from_json("[1, 2]").is_err());
    }
}
