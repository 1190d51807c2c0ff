//! Stage 3: Rule Evaluator
//!
//! Classifies every rule against its ideal and safety ranges (inclusive
//! bounds) and aggregates a weighted penalty score. An invalid feature is
//! always `Unknown`: it never passes as Ok and never alarms as Critical.

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use crate::pose::{PoseDefinition, RuleDefinition};
use crate::types::{BodyRegion, Direction, RuleStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub region: BodyRegion,
    pub weight: f64,
    pub status: RuleStatus,
    pub value: Option<f64>,
    /// Way back into the ideal range, when outside it
    pub direction: Option<Direction>,
}

/// Raw (un-debounced) verdict for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEvaluation {
    pub sequence: u64,
    pub timestamp_ms: u64,
    /// One entry per pose rule, in rule order
    pub rules: Vec<RuleEvaluation>,
    /// Σ weight × points (Ok 0, Warning 1, Critical 3); Unknown excluded
    pub score: f64,
    /// Valid rules / total rules
    pub coverage: f64,
    pub has_critical: bool,
    /// Percentage of valid rules that are Ok; `None` with no valid rule
    pub alignment_score: Option<f64>,
}

impl FrameEvaluation {
    /// Fraction of a region's rules with a valid value this frame.
    pub fn region_coverage(&self, region: BodyRegion) -> f64 {
        let (total, valid) = self
            .rules
            .iter()
            .filter(|r| r.region == region)
            .fold((0usize, 0usize), |(t, v), r| {
                (t + 1, v + usize::from(r.status != RuleStatus::Unknown))
            });
        if total == 0 {
            0.0
        } else {
            valid as f64 / total as f64
        }
    }

    pub fn count(&self, status: RuleStatus) -> usize {
        self.rules.iter().filter(|r| r.status == status).count()
    }
}

/// Classify one value against a rule's ranges.
pub fn classify(rule: &RuleDefinition, value: Option<f64>) -> RuleStatus {
    match value {
        None => RuleStatus::Unknown,
        Some(v) if !v.is_finite() => RuleStatus::Unknown,
        Some(v) if rule.ideal.contains(v) => RuleStatus::Ok,
        Some(v) if rule.safety.contains(v) => RuleStatus::Warning,
        Some(_) => RuleStatus::Critical,
    }
}

/// Evaluate a feature vector against the pose it was extracted for.
pub fn evaluate(features: &FeatureVector, pose: &PoseDefinition) -> FrameEvaluation {
    let rules: Vec<RuleEvaluation> = pose
        .rules
        .iter()
        .map(|rule| {
            let value = features.value(&rule.id);
            let status = classify(rule, value);
            RuleEvaluation {
                rule_id: rule.id.clone(),
                region: rule.region,
                weight: rule.weight,
                status,
                value,
                direction: value
                    .filter(|_| status != RuleStatus::Unknown)
                    .and_then(|v| rule.ideal.correction_direction(v)),
            }
        })
        .collect();

    let score = rules.iter().map(|r| r.weight * r.status.penalty_points()).sum();
    let valid = rules.iter().filter(|r| r.status != RuleStatus::Unknown).count();
    let ok = rules.iter().filter(|r| r.status == RuleStatus::Ok).count();
    let coverage = if rules.is_empty() { 0.0 } else { valid as f64 / rules.len() as f64 };
    let alignment_score = (valid > 0).then(|| ok as f64 / valid as f64 * 100.0);
    let has_critical = rules.iter().any(|r| r.status == RuleStatus::Critical);

    FrameEvaluation {
        sequence: features.sequence,
        timestamp_ms: features.timestamp_ms,
        rules,
        score,
        coverage,
        has_critical,
        alignment_score,
    }
}
