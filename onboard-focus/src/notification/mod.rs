//! Focus-change notifications.
//!
//! Events are fanned out to every configured channel. Delivery is best
//! effort: a failing channel is logged and never blocks the others or the
//! rotation that produced the event.

pub mod channels;
pub mod events;
mod service;

pub use channels::{ChannelConfig, NotificationChannel};
pub use events::FocusEvent;
pub use service::{DispatchReport, NotificationService};
