//! Engine output events and per-session diagnostics counters

use serde::{Deserialize, Serialize};

use super::{AngleRange, BodyRegion, Direction, LandmarkId, Severity};

// ============================================================================
// Correction Events
// ============================================================================

/// Structured corrective feedback for one body region.
///
/// Carries no human-readable text; phrasing is the coaching collaborator's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEvent {
    pub pose_id: String,
    pub rule_id: String,
    pub region: BodyRegion,
    pub direction: Direction,
    pub severity: Severity,
    pub timestamp_ms: u64,
    pub sequence: u64,
    /// Measured value this frame (degrees), `None` if the feature was invalid
    pub value: Option<f64>,
    /// Ideal range the practitioner should move towards
    pub target: AngleRange,
}

// ============================================================================
// Difficulty Decisions
// ============================================================================

/// Verdict of the adaptive difficulty controller.
///
/// `Maintain` is the "no change" verdict and never leaves the engine as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyDecision {
    Maintain,
    Simplify,
    Advance,
}

impl std::fmt::Display for DifficultyDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DifficultyDecision::Maintain => "maintain",
            DifficultyDecision::Simplify => "simplify",
            DifficultyDecision::Advance => "advance",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyEvent {
    pub decision: DifficultyDecision,
    pub from_pose: String,
    /// Linked variant the session switched to (or would switch to)
    pub to_pose: String,
    pub timestamp_ms: u64,
    pub sequence: u64,
    /// Fraction of critical frames in the window that triggered the decision
    pub critical_fraction: f64,
    /// Lowest per-frame coverage in the window
    pub min_coverage: f64,
}

// ============================================================================
// Motion Hazard
// ============================================================================

/// Rising edge of the motion-hazard flag (jerky or too-fast movement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionHazardEvent {
    pub timestamp_ms: u64,
    pub sequence: u64,
    /// Fastest landmark this frame and its speed (normalized units per second)
    pub fastest_landmark: Option<LandmarkId>,
    pub max_landmark_speed: f64,
    /// Fastest rule angle change this frame (degrees per second)
    pub max_angular_speed: f64,
}

// ============================================================================
// Engine Event
// ============================================================================

/// Everything a session publishes to its event sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Correction(CorrectionEvent),
    Difficulty(DifficultyEvent),
    MotionHazard(MotionHazardEvent),
}

impl EngineEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            EngineEvent::Correction(e) => e.sequence,
            EngineEvent::Difficulty(e) => e.sequence,
            EngineEvent::MotionHazard(e) => e.sequence,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            EngineEvent::Correction(e) => e.timestamp_ms,
            EngineEvent::Difficulty(e) => e.timestamp_ms,
            EngineEvent::MotionHazard(e) => e.timestamp_ms,
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Per-session counters. Nothing here affects engine behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub frames_received: u64,
    pub frames_processed: u64,
    pub frames_out_of_order: u64,
    pub budget_exceeded: u64,
    /// Landmark-frames held or extrapolated through low confidence
    pub landmarks_extrapolated: u64,
    /// Landmark-frames marked unusable
    pub landmarks_unusable: u64,
    /// Rule evaluations that came out Unknown
    pub rules_unknown: u64,
    pub corrections_emitted: u64,
    pub corrections_rate_limited: u64,
    pub corrections_low_coverage: u64,
    pub difficulty_decisions: u64,
    /// Decisions suppressed because the pose has no linked variant
    pub difficulty_suppressed: u64,
    pub motion_hazards: u64,
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frames: {}/{} (out-of-order {}, over budget {}), Corrections: {} (rate-limited {}), Difficulty: {}, Hazards: {}",
            self.frames_processed,
            self.frames_received,
            self.frames_out_of_order,
            self.budget_exceeded,
            self.corrections_emitted,
            self.corrections_rate_limited,
            self.difficulty_decisions,
            self.motion_hazards,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_event_serializes_with_type_tag() {
        let event = EngineEvent::Difficulty(DifficultyEvent {
            decision: DifficultyDecision::Simplify,
            from_pose: "parvatasana".to_string(),
            to_pose: "ashwa_sanchalanasana".to_string(),
            timestamp_ms: 5000,
            sequence: 150,
            critical_fraction: 1.0,
            min_coverage: 1.0,
        });
        let json = serde_json::to_string(&event).expect("serializable");
        assert!(json.contains(r#""type":"difficulty""#));
        assert!(json.contains(r#""decision":"simplify""#));
        assert_eq!(event.sequence(), 150);
    }
}
