//! Shared data structures for the pose safety pipeline
//!
//! - Input: `LandmarkFrame` (vision collaborator output, one per camera frame)
//! - Rule vocabulary: `BodyRegion`, `AngleRange`, `RuleStatus`, `Direction`
//! - Output: `EngineEvent` (corrections, difficulty decisions, motion hazards)
//! - `Diagnostics` counters kept per session

mod events;
mod landmark;
mod rule;

pub use events::*;
pub use landmark::*;
pub use rule::*;

/// Identifier assigned to each running session.
pub type SessionId = uuid::Uuid;
