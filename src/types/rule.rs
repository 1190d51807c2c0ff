//! Rule-level vocabulary: body regions, angle ranges, statuses and directions

use serde::{Deserialize, Serialize};

// ============================================================================
// Body Region
// ============================================================================

/// Body region a rule belongs to. Corrections are rate-limited per region.
///
/// Variant order is the stable iteration order used when emitting corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    Neck,
    Shoulders,
    Arms,
    Spine,
    Hips,
    Knees,
    Ankles,
}

impl std::fmt::Display for BodyRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BodyRegion::Neck => "neck",
            BodyRegion::Shoulders => "shoulders",
            BodyRegion::Arms => "arms",
            BodyRegion::Spine => "spine",
            BodyRegion::Hips => "hips",
            BodyRegion::Knees => "knees",
            BodyRegion::Ankles => "ankles",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Angle Range
// ============================================================================

/// Closed interval of degrees. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl AngleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `true` when `self` lies entirely inside `outer`.
    pub fn is_within(&self, outer: &AngleRange) -> bool {
        self.min >= outer.min && self.max <= outer.max
    }

    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    /// Direction the measured value must move to re-enter the range, if outside.
    pub fn correction_direction(&self, value: f64) -> Option<Direction> {
        if value < self.min {
            Some(Direction::Increase)
        } else if value > self.max {
            Some(Direction::Decrease)
        } else {
            None
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

impl std::fmt::Display for AngleRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.1}°, {:.1}°]", self.min, self.max)
    }
}

// ============================================================================
// Status / Severity / Direction
// ============================================================================

/// Per-rule classification for one frame (raw) or after debouncing (confirmed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Feature could not be computed; never treated as Ok or Critical
    #[default]
    Unknown,
    Ok,
    Warning,
    Critical,
}

impl RuleStatus {
    /// Ordering used to decide whether a transition worsens or recovers.
    /// `Unknown` has no rank.
    pub const fn severity_rank(self) -> Option<u8> {
        match self {
            RuleStatus::Unknown => None,
            RuleStatus::Ok => Some(0),
            RuleStatus::Warning => Some(1),
            RuleStatus::Critical => Some(2),
        }
    }

    /// Score contribution before weighting.
    pub const fn penalty_points(self) -> f64 {
        match self {
            RuleStatus::Unknown | RuleStatus::Ok => 0.0,
            RuleStatus::Warning => 1.0,
            RuleStatus::Critical => 3.0,
        }
    }

    pub const fn is_violation(self) -> bool {
        matches!(self, RuleStatus::Warning | RuleStatus::Critical)
    }

    pub const fn severity(self) -> Option<Severity> {
        match self {
            RuleStatus::Warning => Some(Severity::Warning),
            RuleStatus::Critical => Some(Severity::Critical),
            RuleStatus::Unknown | RuleStatus::Ok => None,
        }
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleStatus::Unknown => "UNKNOWN",
            RuleStatus::Ok => "OK",
            RuleStatus::Warning => "WARNING",
            RuleStatus::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Severity carried by a correction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// Which way the measured value must move to re-enter the ideal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}
