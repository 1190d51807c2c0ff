//! Stage 2: Feature Extractor
//!
//! Pure function from a smoothed frame to per-rule geometric measurements:
//! joint angles, alignment deviations, their angular velocities, per-landmark
//! speeds and the motion-hazard flag. Anything computed from an unusable
//! landmark or a degenerate segment is `None` (Invalid), never a guess.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::preprocess::SmoothedFrame;
use crate::config::defaults::MIN_ELAPSED_SECS;
use crate::config::FeatureConfig;
use crate::pose::{PoseDefinition, ReferenceAxis, RuleDefinition, RuleGeometry};
use crate::types::{LandmarkId, Point3};

/// Segments shorter than this (normalized units) have no direction.
const DEGENERATE_SEGMENT: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFeature {
    pub rule_id: String,
    /// Degrees; `None` when the feature is Invalid this frame
    pub value: Option<f64>,
    /// Degrees per second against the previous frame's value
    pub angular_velocity: Option<f64>,
}

/// Everything the evaluator and the next frame's extractor need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sequence: u64,
    pub timestamp_ms: u64,
    /// One entry per pose rule, in rule order
    pub rules: Vec<RuleFeature>,
    /// Usable smoothed positions this frame
    pub positions: BTreeMap<LandmarkId, Point3>,
    /// Normalized units per second, for landmarks usable in both frames
    pub speeds: BTreeMap<LandmarkId, f64>,
    pub motion_hazard: bool,
    /// Fraction of rules with a valid value
    pub coverage: f64,
}

impl FeatureVector {
    pub fn rule(&self, rule_id: &str) -> Option<&RuleFeature> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    pub fn value(&self, rule_id: &str) -> Option<f64> {
        self.rule(rule_id).and_then(|r| r.value)
    }

    /// Fastest landmark and its speed.
    pub fn fastest_landmark(&self) -> Option<(LandmarkId, f64)> {
        self.speeds
            .iter()
            .map(|(id, s)| (*id, *s))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn max_angular_speed(&self) -> f64 {
        self.rules
            .iter()
            .filter_map(|r| r.angular_velocity)
            .map(f64::abs)
            .fold(0.0, f64::max)
    }
}

// ============================================================================
// Geometry
// ============================================================================

fn dot(a: Point3, b: Point3) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

/// Angle at `b` between `b->a` and `b->c`, in degrees.
pub fn joint_angle(a: Point3, b: Point3, c: Point3) -> Option<f64> {
    let u = a.sub(b);
    let v = c.sub(b);
    let (nu, nv) = (u.norm(), v.norm());
    if nu < DEGENERATE_SEGMENT || nv < DEGENERATE_SEGMENT {
        return None;
    }
    let cos = (dot(u, v) / (nu * nv)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Unsigned deviation of segment `from -> to` from an image axis, in [0, 90] degrees.
pub fn axis_deviation(from: Point3, to: Point3, reference: ReferenceAxis) -> Option<f64> {
    let d = to.sub(from).planar();
    if d.norm() < DEGENERATE_SEGMENT {
        return None;
    }
    let (dx, dy) = (d.x.abs(), d.y.abs());
    let deg = match reference {
        ReferenceAxis::Vertical => dx.atan2(dy),
        ReferenceAxis::Horizontal => dy.atan2(dx),
    };
    Some(deg.to_degrees())
}

fn measure(rule: &RuleDefinition, frame: &SmoothedFrame, use_depth: bool) -> Option<f64> {
    let project = |p: Point3| if use_depth { p } else { p.planar() };
    match &rule.geometry {
        RuleGeometry::JointAngle { points: [a, b, c] } => {
            let a = project(frame.usable(*a)?);
            let b = project(frame.usable(*b)?);
            let c = project(frame.usable(*c)?);
            joint_angle(a, b, c)
        }
        RuleGeometry::Alignment { from, to, reference } => {
            let from = from.iter().map(|id| frame.usable(*id)).collect::<Option<Vec<_>>>()?;
            let to = to.iter().map(|id| frame.usable(*id)).collect::<Option<Vec<_>>>()?;
            axis_deviation(Point3::centroid(from)?, Point3::centroid(to)?, *reference)
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Compute the feature vector for one frame.
///
/// `previous` is the last frame's vector (any pose); velocities are taken
/// against it using the capture-timestamp delta.
pub fn extract_features(
    frame: &SmoothedFrame,
    pose: &PoseDefinition,
    previous: Option<&FeatureVector>,
    config: &FeatureConfig,
) -> FeatureVector {
    let elapsed = previous.and_then(|prev| {
        let dt = frame.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0;
        (dt >= MIN_ELAPSED_SECS).then_some(dt)
    });

    let rules: Vec<RuleFeature> = pose
        .rules
        .iter()
        .map(|rule| {
            let value = measure(rule, frame, config.use_depth);
            let angular_velocity = match (value, elapsed, previous.and_then(|p| p.value(&rule.id))) {
                (Some(now), Some(dt), Some(before)) => Some((now - before) / dt),
                _ => None,
            };
            RuleFeature {
                rule_id: rule.id.clone(),
                value,
                angular_velocity,
            }
        })
        .collect();

    let positions: BTreeMap<LandmarkId, Point3> = frame
        .landmarks
        .iter()
        .filter(|(_, l)| l.quality.is_usable())
        .map(|(id, l)| (*id, l.position))
        .collect();

    let speeds: BTreeMap<LandmarkId, f64> = match (previous, elapsed) {
        (Some(prev), Some(dt)) => positions
            .iter()
            .filter_map(|(id, p)| {
                let before = prev.positions.get(id)?;
                let (p, before) = if config.use_depth { (*p, *before) } else { (p.planar(), before.planar()) };
                Some((*id, p.distance(before) / dt))
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    let valid = rules.iter().filter(|r| r.value.is_some()).count();
    let coverage = if rules.is_empty() { 0.0 } else { valid as f64 / rules.len() as f64 };

    let mut features = FeatureVector {
        sequence: frame.sequence,
        timestamp_ms: frame.timestamp_ms,
        rules,
        positions,
        speeds,
        motion_hazard: false,
        coverage,
    };
    let too_fast = features
        .fastest_landmark()
        .is_some_and(|(_, s)| s > config.max_landmark_speed);
    features.motion_hazard = too_fast || features.max_angular_speed() > config.max_angular_speed_deg;
    features
}
