//! Stage 6: Adaptive Difficulty Controller
//!
//! Watches a ring buffer of per-frame outcomes and asks for an easier or
//! harder variant when the practitioner is consistently struggling or
//! consistently clean. A decision clears the buffer and locks the controller
//! for `cooldown_seconds` of capture time, so it cannot oscillate.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::types::DifficultyDecision;

/// One frame's contribution to the difficulty window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSample {
    pub score: f64,
    pub has_critical: bool,
    pub coverage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControllerState {
    Maintaining,
    SimplifyRequested { until_ms: u64 },
    AdvanceRequested { until_ms: u64 },
}

/// Which variant links the current pose offers (and the practitioner may use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariantAvailability {
    pub easier: bool,
    pub harder: bool,
}

/// Verdict with the window statistics that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyVerdict {
    pub decision: DifficultyDecision,
    pub critical_fraction: f64,
    pub min_coverage: f64,
    pub mean_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DifficultyOutcome {
    /// Window not full, in cooldown, or nothing to change
    Hold,
    Decided(DifficultyVerdict),
    /// A decision was warranted but the pose has no such variant
    Suppressed(DifficultyVerdict),
}

#[derive(Debug, Clone)]
pub struct DifficultyController {
    window: VecDeque<WindowSample>,
    capacity: usize,
    simplify_threshold: f64,
    advance_threshold: f64,
    cooldown_ms: u64,
    state: ControllerState,
}

impl DifficultyController {
    pub fn new(config: &SessionConfig) -> Self {
        let capacity = config.difficulty_window_frames.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            simplify_threshold: config.simplify_threshold,
            advance_threshold: config.advance_threshold,
            cooldown_ms: config.cooldown_ms(),
            state: ControllerState::Maintaining,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    fn in_cooldown(&self, now_ms: u64) -> bool {
        match self.state {
            ControllerState::Maintaining => false,
            ControllerState::SimplifyRequested { until_ms }
            | ControllerState::AdvanceRequested { until_ms } => now_ms < until_ms,
        }
    }

    /// Push one frame and decide.
    pub fn observe(
        &mut self,
        sample: WindowSample,
        now_ms: u64,
        variants: VariantAvailability,
    ) -> DifficultyOutcome {
        if self.state != ControllerState::Maintaining && !self.in_cooldown(now_ms) {
            info!(now_ms, "Difficulty cooldown expired, maintaining");
            self.state = ControllerState::Maintaining;
        }

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        if self.window.len() < self.capacity || self.in_cooldown(now_ms) {
            return DifficultyOutcome::Hold;
        }

        let verdict = self.verdict();
        let available = match verdict.decision {
            DifficultyDecision::Maintain => return DifficultyOutcome::Hold,
            DifficultyDecision::Simplify => variants.easier,
            DifficultyDecision::Advance => variants.harder,
        };

        // Either way the window has been judged; start the next one fresh
        self.window.clear();

        if !available {
            debug!(decision = %verdict.decision, "Difficulty decision suppressed: no variant");
            return DifficultyOutcome::Suppressed(verdict);
        }

        let until_ms = now_ms.saturating_add(self.cooldown_ms);
        self.state = match verdict.decision {
            DifficultyDecision::Simplify => ControllerState::SimplifyRequested { until_ms },
            _ => ControllerState::AdvanceRequested { until_ms },
        };
        DifficultyOutcome::Decided(verdict)
    }

    fn verdict(&self) -> DifficultyVerdict {
        let n = self.window.len().max(1) as f64;
        let critical = self.window.iter().filter(|s| s.has_critical).count();
        let critical_fraction = critical as f64 / n;
        let min_coverage = self
            .window
            .iter()
            .map(|s| s.coverage)
            .fold(f64::INFINITY, f64::min);
        let mean_score = self.window.iter().map(|s| s.score).sum::<f64>() / n;

        let decision = if critical_fraction > self.simplify_threshold {
            DifficultyDecision::Simplify
        } else if critical == 0 && min_coverage >= self.advance_threshold {
            DifficultyDecision::Advance
        } else {
            DifficultyDecision::Maintain
        };

        DifficultyVerdict {
            decision,
            critical_fraction,
            min_coverage,
            mean_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: VariantAvailability = VariantAvailability { easier: true, harder: true };

    fn critical() -> WindowSample {
        WindowSample { score: 4.5, has_critical: true, coverage: 1.0 }
    }

    fn clean() -> WindowSample {
        WindowSample { score: 0.0, has_critical: false, coverage: 1.0 }
    }

    fn small_config() -> SessionConfig {
        SessionConfig {
            difficulty_window_frames: 10,
            cooldown_seconds: 1.0,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn simplify_fires_once_when_window_fills() {
        let mut c = DifficultyController::new(&small_config());
        let mut decisions = vec![];
        for i in 0..10u64 {
            decisions.push(c.observe(critical(), i * 33, BOTH));
        }
        assert!(decisions[..9].iter().all(|d| *d == DifficultyOutcome::Hold));
        assert!(matches!(
            decisions[9],
            DifficultyOutcome::Decided(DifficultyVerdict { decision: DifficultyDecision::Simplify, .. })
        ));
        assert_eq!(c.window_len(), 0);
        assert!(matches!(c.state(), ControllerState::SimplifyRequested { until_ms: 1297 }));
    }

    #[test]
    fn no_decision_during_cooldown() {
        let mut c = DifficultyController::new(&small_config());
        for i in 0..10u64 {
            c.observe(critical(), i * 33, BOTH);
        }
        // Refill the window well inside the 1 s cooldown
        for i in 10..25u64 {
            assert_eq!(c.observe(critical(), 297 + (i - 9) * 20, BOTH), DifficultyOutcome::Hold);
        }
        // After the cooldown the next full window decides again
        let after = c.observe(critical(), 2000, BOTH);
        assert!(matches!(after, DifficultyOutcome::Decided(_)));
    }

    #[test]
    fn mixed_window_maintains() {
        let mut c = DifficultyController::new(&small_config());
        let mut last = DifficultyOutcome::Hold;
        for i in 0..20u64 {
            let sample = if i % 2 == 0 { critical() } else { clean() };
            last = c.observe(sample, i * 33, BOTH);
            assert_eq!(last, DifficultyOutcome::Hold);
        }
        assert_eq!(last, DifficultyOutcome::Hold);
        assert_eq!(c.state(), ControllerState::Maintaining);
    }

    #[test]
    fn advance_requires_full_coverage_every_frame() {
        let mut c = DifficultyController::new(&small_config());
        for i in 0..9u64 {
            c.observe(clean(), i * 33, BOTH);
        }
        let low = WindowSample { coverage: 0.5, ..clean() };
        assert_eq!(c.observe(low, 300, BOTH), DifficultyOutcome::Hold);
        // Slide the low-coverage frame out of the window
        let mut outcome = DifficultyOutcome::Hold;
        for i in 0..10u64 {
            outcome = c.observe(clean(), 333 + i * 33, BOTH);
        }
        assert!(matches!(
            outcome,
            DifficultyOutcome::Decided(DifficultyVerdict { decision: DifficultyDecision::Advance, .. })
        ));
    }

    #[test]
    fn missing_variant_suppresses_without_cooldown() {
        let mut c = DifficultyController::new(&small_config());
        let mut outcome = DifficultyOutcome::Hold;
        for i in 0..10u64 {
            outcome = c.observe(critical(), i * 33, VariantAvailability::default());
        }
        assert!(matches!(outcome, DifficultyOutcome::Suppressed(_)));
        assert_eq!(c.state(), ControllerState::Maintaining);
        assert_eq!(c.window_len(), 0);
    }
}
