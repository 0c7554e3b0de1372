//! onboard-focus library crate.
//!
//! Keeps exactly one live stream "in focus" and a relay process pointed at
//! it. The focus engine and the read API live in the `onboard-focus`
//! binary; the relay supervisor runs either in-process or as the separate
//! `focus-relay` binary polling the API.

pub mod api;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notification;
pub mod owners;
pub mod relay;
pub mod utils;

pub use error::{Error, Result};
