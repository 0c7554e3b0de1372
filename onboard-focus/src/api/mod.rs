//! Read-only HTTP API.
//!
//! Serves the current focus to the relay and stream-key lookups to other
//! services. Nothing here mutates engine state.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
