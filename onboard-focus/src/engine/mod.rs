//! Discovery and selection engine.
//!
//! A single actor task owns the candidate set and the focus. The membership
//! sync loop and the rotation loop only talk to it through a
//! [`FocusHandle`], so their read-modify-write sequences are serialized by
//! the actor's mailbox. Reads of the focus name go through a `watch`
//! channel and never wait on the mailbox.

mod actor;
mod handle;
mod notifier;
mod service;

pub use handle::{DEFAULT_MAILBOX_CAPACITY, DEFAULT_SEND_TIMEOUT, FocusHandle, FocusSnapshot};
pub use notifier::FocusNotifier;
pub use service::{
    DEFAULT_ROTATE_INTERVAL, DEFAULT_SYNC_INTERVAL, FocusEngine, FocusEngineConfig, spawn_focus_actor,
    sync_once,
};
