//! Pose safety pipeline
//!
//! ## Stages (per frame, leaves first)
//!
//! 1. `preprocess` - confidence gating, smoothing, short-gap extrapolation
//! 2. `features` - joint angles, alignment deviations, velocities (pure)
//! 3. `evaluator` - per-rule status, weighted score, coverage (pure)
//! 4. `debounce` - asymmetric hysteresis per rule
//! 5. `corrections` - one correction per region per rate-limit window
//! 6. `difficulty` - ring-buffer controller with cooldown
//!
//! `session::PoseSession` owns the cross-frame state and runs the stages in
//! order; `session_metrics` accumulates alignment, fatigue, stability and
//! symmetry for snapshots.

pub mod corrections;
pub mod debounce;
pub mod difficulty;
pub mod evaluator;
pub mod features;
pub mod preprocess;
pub mod rate_limiter;
pub mod session;
pub mod session_metrics;

#[cfg(test)]
pub(crate) mod testing;

pub use corrections::{CorrectionGenerator, CorrectionOutcome};
pub use debounce::{DebounceThresholds, RuleDebounce, StatusTransition};
pub use difficulty::{ControllerState, DifficultyController, DifficultyOutcome, WindowSample};
pub use evaluator::{evaluate, FrameEvaluation, RuleEvaluation};
pub use features::{extract_features, FeatureVector, RuleFeature};
pub use preprocess::{preprocess, LandmarkQuality, SmoothedFrame, SmoothingState};
pub use session::{FrameReport, PoseSession, RuleSnapshot, RuleStatusSnapshot, SessionState};
pub use session_metrics::{MetricsReport, SessionMetrics};
