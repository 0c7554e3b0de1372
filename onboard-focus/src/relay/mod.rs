//! Relay supervisor.
//!
//! Polls the current focus and keeps exactly one ffmpeg relay running,
//! republishing either the focused stream or generated silence to a fixed
//! destination.

mod command;
mod process;
mod source;
mod supervisor;

pub use command::{FfmpegRelayConfig, RelayTarget};
pub use process::{FfmpegLauncher, FfmpegRelay, RelayChild, RelayLauncher};
pub use source::{FocusSource, HttpFocusSource};
pub use supervisor::{
    RelayState, RelaySupervisor, RelaySupervisorConfig, RestartBackoff, TickOutcome,
};
