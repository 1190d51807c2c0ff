//! Stage 5: Correction Generator
//!
//! Turns confirmed violations into at most one `CorrectionEvent` per body
//! region per rate-limit window. Within a region the most important violated
//! rule wins: Critical over Warning, then higher weight, then definition
//! order. Critical violations do not bypass the window.

use tracing::debug;

use super::debounce::RuleDebounce;
use super::evaluator::FrameEvaluation;
use super::rate_limiter::RegionRateLimiter;
use crate::config::EngineConfig;
use crate::pose::PoseDefinition;
use crate::types::{BodyRegion, CorrectionEvent};

/// Corrections emitted for one frame plus why others were held back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionOutcome {
    pub events: Vec<CorrectionEvent>,
    pub rate_limited: u64,
    pub low_coverage: u64,
}

#[derive(Debug, Clone)]
pub struct CorrectionGenerator {
    limiter: RegionRateLimiter,
    min_region_coverage: f64,
}

impl CorrectionGenerator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            limiter: RegionRateLimiter::new(config.session.rate_limit_ms()),
            min_region_coverage: config.corrections.min_region_coverage,
        }
    }

    pub fn last_emission(&self, region: BodyRegion) -> Option<u64> {
        self.limiter.last_emission(region)
    }

    /// `trackers` is aligned with `pose.rules`.
    pub fn generate(
        &mut self,
        pose: &PoseDefinition,
        trackers: &[RuleDebounce],
        evaluation: &FrameEvaluation,
    ) -> CorrectionOutcome {
        let mut outcome = CorrectionOutcome::default();
        let now = evaluation.timestamp_ms;

        for region in pose.regions() {
            // Highest-priority confirmed violation in this region
            let Some((index, severity)) = pose
                .rules
                .iter()
                .zip(trackers)
                .enumerate()
                .filter(|(_, (rule, _))| rule.region == region)
                .filter_map(|(i, (rule, t))| t.confirmed().severity().map(|s| (i, s, rule.weight)))
                .max_by(|a, b| {
                    a.1.cmp(&b.1)
                        .then(a.2.total_cmp(&b.2))
                        // earlier definition wins ties
                        .then(b.0.cmp(&a.0))
                })
                .map(|(i, s, _)| (i, s))
            else {
                continue;
            };

            let rule = &pose.rules[index];
            let coverage = evaluation.region_coverage(region);
            if coverage < self.min_region_coverage {
                debug!(region = %region, rule = %rule.id, coverage, "Correction held: low region coverage");
                outcome.low_coverage += 1;
                continue;
            }
            if !self.limiter.can_emit(region, now) {
                debug!(region = %region, rule = %rule.id, "Correction rate-limited");
                outcome.rate_limited += 1;
                continue;
            }
            let Some(direction) = trackers[index].last_direction() else {
                continue;
            };

            self.limiter.record(region, now);
            outcome.events.push(CorrectionEvent {
                pose_id: pose.id.clone(),
                rule_id: rule.id.clone(),
                region,
                direction,
                severity,
                timestamp_ms: now,
                sequence: evaluation.sequence,
                value: evaluation.rules.get(index).and_then(|r| r.value),
                target: rule.ideal,
            });
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::debounce::DebounceThresholds;
    use crate::engine::evaluator::RuleEvaluation;
    use crate::pose::PoseLibrary;
    use crate::types::{Direction, RuleStatus, Severity};

    fn confirmed(status: RuleStatus, direction: Option<Direction>) -> RuleDebounce {
        let th = DebounceThresholds { worsening: 1, recovering: 1 };
        let mut t = RuleDebounce::new();
        t.update(status, direction, &th);
        t
    }

    fn evaluation(pose: &PoseDefinition, ts: u64, values: &[Option<f64>]) -> FrameEvaluation {
        FrameEvaluation {
            sequence: ts / 33,
            timestamp_ms: ts,
            rules: pose
                .rules
                .iter()
                .zip(values)
                .map(|(r, v)| RuleEvaluation {
                    rule_id: r.id.clone(),
                    region: r.region,
                    weight: r.weight,
                    status: if v.is_some() { RuleStatus::Ok } else { RuleStatus::Unknown },
                    value: *v,
                    direction: None,
                })
                .collect(),
            score: 0.0,
            coverage: 1.0,
            has_critical: false,
            alignment_score: None,
        }
    }

    #[test]
    fn one_event_per_region_with_critical_first() {
        let library = PoseLibrary::builtin().expect("valid");
        let pose = library.get("parvatasana").expect("present");
        // left_knee Warning, right_knee Critical, elbows Ok, hip_elevation Ok
        let trackers = vec![
            confirmed(RuleStatus::Warning, Some(Direction::Increase)),
            confirmed(RuleStatus::Critical, Some(Direction::Increase)),
            confirmed(RuleStatus::Ok, None),
            confirmed(RuleStatus::Ok, None),
            confirmed(RuleStatus::Ok, None),
        ];
        let mut gen = CorrectionGenerator::new(&EngineConfig::default());
        let eval = evaluation(pose, 1000, &[Some(165.0), Some(140.0), Some(175.0), Some(175.0), Some(45.0)]);
        let out = gen.generate(pose, &trackers, &eval);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].rule_id, "right_knee");
        assert_eq!(out.events[0].severity, Severity::Critical);
        assert_eq!(out.events[0].value, Some(140.0));
    }

    #[test]
    fn critical_does_not_bypass_window() {
        let library = PoseLibrary::builtin().expect("valid");
        let pose = library.get("pranamasana").expect("present");
        let mut trackers = vec![
            confirmed(RuleStatus::Warning, Some(Direction::Decrease)),
            confirmed(RuleStatus::Ok, None),
        ];
        let mut gen = CorrectionGenerator::new(&EngineConfig::default());
        let first = gen.generate(pose, &trackers, &evaluation(pose, 1000, &[Some(10.0), Some(1.0)]));
        assert_eq!(first.events.len(), 1);

        trackers[0] = confirmed(RuleStatus::Critical, Some(Direction::Decrease));
        let second = gen.generate(pose, &trackers, &evaluation(pose, 2500, &[Some(30.0), Some(1.0)]));
        assert!(second.events.is_empty());
        assert_eq!(second.rate_limited, 1);

        let third = gen.generate(pose, &trackers, &evaluation(pose, 3000, &[Some(30.0), Some(1.0)]));
        assert_eq!(third.events.len(), 1);
        assert_eq!(third.events[0].severity, Severity::Critical);
    }

    #[test]
    fn direction_follows_the_confirmed_violation() {
        let library = PoseLibrary::builtin().expect("valid");
        let pose = library.get("pranamasana").expect("present");
        let th = DebounceThresholds { worsening: 1, recovering: 8 };
        let mut spine = RuleDebounce::new();
        spine.update(RuleStatus::Critical, Some(Direction::Increase), &th);
        // One raw frame past the other end of the ideal range
        spine.update(RuleStatus::Warning, Some(Direction::Decrease), &th);
        assert_eq!(spine.confirmed(), RuleStatus::Critical);

        let trackers = vec![spine, confirmed(RuleStatus::Ok, None)];
        let mut gen = CorrectionGenerator::new(&EngineConfig::default());
        let out = gen.generate(pose, &trackers, &evaluation(pose, 1000, &[Some(30.0), Some(1.0)]));
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].severity, Severity::Critical);
        assert_eq!(out.events[0].direction, Direction::Increase);
    }

    #[test]
    fn low_region_coverage_holds_correction() {
        let library = PoseLibrary::builtin().expect("valid");
        let pose = library.get("parvatasana").expect("present");
        let trackers = vec![
            confirmed(RuleStatus::Warning, Some(Direction::Increase)),
            confirmed(RuleStatus::Ok, None),
            confirmed(RuleStatus::Ok, None),
            confirmed(RuleStatus::Ok, None),
            confirmed(RuleStatus::Ok, None),
        ];
        let mut config = EngineConfig::default();
        config.corrections.min_region_coverage = 1.0;
        let mut gen = CorrectionGenerator::new(&config);
        // right knee invalid this frame: knees region coverage 0.5
        let eval = evaluation(pose, 1000, &[Some(165.0), None, Some(175.0), Some(175.0), Some(45.0)]);
        let out = gen.generate(pose, &trackers, &eval);
        assert!(out.events.is_empty());
        assert_eq!(out.low_coverage, 1);
        assert_eq!(gen.last_emission(BodyRegion::Knees), None);
    }
}
