//! In-memory practice metrics: alignment, fatigue, stability and symmetry
//!
//! Nothing here is persisted; long-term progress storage is an external
//! collaborator that can read the `MetricsReport` from a snapshot.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, VecDeque};

use super::evaluator::FrameEvaluation;
use crate::config::defaults::{
    FATIGUE_BASELINE_MIN_SCORE, FATIGUE_SCORE_DROP, FATIGUE_WINDOW_FRAMES, STABILITY_MIN_SAMPLES,
    STABILITY_WINDOW_FRAMES,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Frames with at least one valid rule
    pub scored_frames: u64,
    pub mean_alignment_score: Option<f64>,
    pub last_alignment_score: Option<f64>,
    /// Sticky once detected for the session
    pub fatigue_detected: bool,
    /// 100 − mean per-rule variance over the recent window, floored at 0
    pub stability_score: Option<f64>,
    /// 100 − mean |left − right| over the recent window, floored at 0
    pub symmetry_score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    scored_frames: u64,
    alignment_sum: f64,
    last_alignment: Option<f64>,
    fatigue_window: VecDeque<f64>,
    fatigue_detected: bool,
    rule_history: BTreeMap<String, VecDeque<f64>>,
    /// Per-frame |left − right| differences
    symmetry_history: VecDeque<Vec<f64>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, evaluation: &FrameEvaluation) {
        if let Some(score) = evaluation.alignment_score {
            self.scored_frames += 1;
            self.alignment_sum += score;
            self.last_alignment = Some(score);
            self.update_fatigue(score);
        }

        for rule in &evaluation.rules {
            if let Some(v) = rule.value {
                let history = self.rule_history.entry(rule.rule_id.clone()).or_default();
                if history.len() == STABILITY_WINDOW_FRAMES {
                    history.pop_front();
                }
                history.push_back(v);
            }
        }

        let diffs: Vec<f64> = evaluation
            .rules
            .iter()
            .filter_map(|left| {
                let suffix = left.rule_id.strip_prefix("left_")?;
                let right_id = format!("right_{suffix}");
                let right = evaluation.rules.iter().find(|r| r.rule_id == right_id)?;
                Some((left.value? - right.value?).abs())
            })
            .collect();
        if !diffs.is_empty() {
            if self.symmetry_history.len() == STABILITY_WINDOW_FRAMES {
                self.symmetry_history.pop_front();
            }
            self.symmetry_history.push_back(diffs);
        }
    }

    fn update_fatigue(&mut self, score: f64) {
        if self.fatigue_window.len() == FATIGUE_WINDOW_FRAMES {
            self.fatigue_window.pop_front();
        }
        self.fatigue_window.push_back(score);
        if self.fatigue_detected || self.fatigue_window.len() < FATIGUE_WINDOW_FRAMES {
            return;
        }
        let half = FATIGUE_WINDOW_FRAMES / 2;
        let first = self.fatigue_window.iter().take(half).mean();
        let second = self.fatigue_window.iter().skip(half).mean();
        if first > FATIGUE_BASELINE_MIN_SCORE && second < first - FATIGUE_SCORE_DROP {
            self.fatigue_detected = true;
        }
    }

    pub fn stability_score(&self) -> Option<f64> {
        let variances: Vec<f64> = self
            .rule_history
            .values()
            .filter(|h| h.len() >= STABILITY_MIN_SAMPLES)
            .map(|h| h.iter().population_variance())
            .collect();
        if variances.is_empty() {
            return None;
        }
        Some((100.0 - variances.mean()).max(0.0))
    }

    pub fn symmetry_score(&self) -> Option<f64> {
        let diffs: Vec<f64> = self.symmetry_history.iter().flatten().copied().collect();
        if diffs.is_empty() {
            return None;
        }
        Some((100.0 - diffs.mean()).max(0.0))
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            scored_frames: self.scored_frames,
            mean_alignment_score: (self.scored_frames > 0)
                .then(|| self.alignment_sum / self.scored_frames as f64),
            last_alignment_score: self.last_alignment,
            fatigue_detected: self.fatigue_detected,
            stability_score: self.stability_score(),
            symmetry_score: self.symmetry_score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::evaluator::RuleEvaluation;
    use crate::types::{BodyRegion, RuleStatus};

    fn frame(alignment: Option<f64>, left: Option<f64>, right: Option<f64>) -> FrameEvaluation {
        let rule = |id: &str, value: Option<f64>| RuleEvaluation {
            rule_id: id.to_string(),
            region: BodyRegion::Knees,
            weight: 1.0,
            status: if value.is_some() { RuleStatus::Ok } else { RuleStatus::Unknown },
            value,
            direction: None,
        };
        FrameEvaluation {
            sequence: 0,
            timestamp_ms: 0,
            rules: vec![rule("left_knee", left), rule("right_knee", right)],
            score: 0.0,
            coverage: 1.0,
            has_critical: false,
            alignment_score: alignment,
        }
    }

    #[test]
    fn fatigue_detected_on_sustained_drop() {
        let mut m = SessionMetrics::new();
        for _ in 0..12 {
            m.record(&frame(Some(90.0), None, None));
        }
        for _ in 0..12 {
            m.record(&frame(Some(60.0), None, None));
        }
        assert!(m.report().fatigue_detected);
        // Sticky
        for _ in 0..30 {
            m.record(&frame(Some(100.0), None, None));
        }
        assert!(m.report().fatigue_detected);
    }

    #[test]
    fn no_fatigue_from_a_low_start() {
        let mut m = SessionMetrics::new();
        for i in 0..24 {
            m.record(&frame(Some(if i < 12 { 60.0 } else { 30.0 }), None, None));
        }
        assert!(!m.report().fatigue_detected);
    }

    #[test]
    fn stability_needs_ten_samples() {
        let mut m = SessionMetrics::new();
        for _ in 0..9 {
            m.record(&frame(Some(100.0), Some(170.0), Some(170.0)));
        }
        assert_eq!(m.stability_score(), None);
        m.record(&frame(Some(100.0), Some(170.0), Some(170.0)));
        assert_eq!(m.stability_score(), Some(100.0));
    }

    #[test]
    fn symmetry_penalizes_left_right_difference() {
        let mut m = SessionMetrics::new();
        m.record(&frame(Some(100.0), Some(170.0), Some(160.0)));
        m.record(&frame(Some(100.0), Some(170.0), Some(150.0)));
        let s = m.symmetry_score().expect("pairs recorded");
        assert!((s - 85.0).abs() < 1e-9);
        // An invalid side contributes nothing
        m.record(&frame(Some(100.0), Some(170.0), None));
        assert!((m.symmetry_score().expect("still present") - 85.0).abs() < 1e-9);
    }

    #[test]
    fn mean_alignment_skips_unscored_frames() {
        let mut m = SessionMetrics::new();
        m.record(&frame(Some(50.0), None, None));
        m.record(&frame(None, None, None));
        m.record(&frame(Some(100.0), None, None));
        let r = m.report();
        assert_eq!(r.scored_frames, 2);
        assert_eq!(r.mean_alignment_score, Some(75.0));
    }
}
