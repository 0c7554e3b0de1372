//! Live source discovery.
//!
//! The engine only needs [`SourceDiscovery::list_paths`]; the MediaMTX
//! client additionally registers known stream keys at startup.

mod mediamtx;

pub use mediamtx::{MediaMtxClient, MediaMtxConfig};

use async_trait::async_trait;

use crate::Result;
use crate::domain::SourcePath;

/// Lists every source path known to the media backend.
#[async_trait]
pub trait SourceDiscovery: Send + Sync {
    /// Fetch all paths with their `ready` flags.
    ///
    /// Any failure means "no information this cycle"; callers must not
    /// treat it as an empty list.
    async fn list_paths(&self) -> Result<Vec<SourcePath>>;
}
