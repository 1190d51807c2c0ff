//! Fixed engine constants that are not operator-tunable.
//!
//! Tunable values live in `EngineConfig`; these are the numbers the session
//! metrics, profile adaptation and runtime plumbing are built around.

// ============================================================================
// Session Metrics
// ============================================================================

/// Alignment-score window inspected for fatigue (frames).
pub const FATIGUE_WINDOW_FRAMES: usize = 24;

/// First-half mean alignment score above which fatigue can be flagged.
pub const FATIGUE_BASELINE_MIN_SCORE: f64 = 70.0;

/// Drop from the first-half mean to the second-half mean that signals fatigue.
pub const FATIGUE_SCORE_DROP: f64 = 15.0;

/// Rule-value history kept for stability and symmetry (frames).
pub const STABILITY_WINDOW_FRAMES: usize = 50;

/// Minimum samples per rule before stability is reported.
pub const STABILITY_MIN_SAMPLES: usize = 10;

// ============================================================================
// Practitioner Profile
// ============================================================================

/// Ideal-range widening for beginners (degrees per side).
pub const BEGINNER_TOLERANCE_DEG: f64 = 10.0;

/// Ideal-range widening for intermediate practitioners (degrees per side).
pub const INTERMEDIATE_TOLERANCE_DEG: f64 = 5.0;

/// Ideal-range narrowing for advanced practitioners (degrees per side).
pub const ADVANCED_TOLERANCE_DEG: f64 = -5.0;

/// Narrowing never shrinks an ideal range below this width (degrees).
pub const MIN_IDEAL_WIDTH_DEG: f64 = 1.0;

// ============================================================================
// Runtime
// ============================================================================

/// Control-command channel capacity per session task.
pub const SESSION_COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Nominal capture rate for converting frame counts to seconds in config checks (frames/s).
pub const NOMINAL_FRAME_RATE_HZ: f64 = 30.0;

/// Minimum elapsed time treated as a real timestamp delta (seconds).
///
/// Two frames with identical capture timestamps produce no velocity.
pub const MIN_ELAPSED_SECS: f64 = 1e-4;
