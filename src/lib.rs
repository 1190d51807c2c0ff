//! poseguard: real-time pose safety and correction engine
//!
//! Turns a stream of body-landmark frames into safety signals for a guided
//! practice session.
//!
//! ## Architecture
//!
//! - **Pose library** (`pose`): declarative rule sets, variant links,
//!   contraindications, and per-practitioner adaptation
//! - **Engine** (`engine`): preprocess → features → evaluate → debounce →
//!   corrections → difficulty, driven per session by `PoseSession`
//! - **Runtime** (`runtime`): one tokio task per session behind a
//!   drop-oldest frame queue, plus frame sources and a session manager
//! - **Config** (`config`): TOML engine configuration with validation

pub mod config;
pub mod engine;
pub mod error;
pub mod pose;
pub mod runtime;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use engine::{FrameReport, PoseSession, RuleStatusSnapshot};
pub use error::{EngineError, Result};
pub use pose::{ExperienceLevel, PoseDefinition, PoseLibrary, PractitionerProfile};
pub use runtime::{SessionEvent, SessionHandle, SessionManager, SessionSummary};
pub use types::{
    BodyRegion, CorrectionEvent, Diagnostics, DifficultyDecision, DifficultyEvent, EngineEvent,
    LandmarkFrame, LandmarkId, MotionHazardEvent, RuleStatus, SessionId,
};
