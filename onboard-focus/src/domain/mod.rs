//! Domain types for focus selection.

pub mod focus;
pub mod source;

pub use focus::{FocusState, RotationPlan, SyncOutcome};
pub use source::SourcePath;
