//! Stage 4: Hysteresis/Debounce State Machine
//!
//! Each rule keeps a confirmed status and a candidate that must be observed
//! on consecutive frames before it is confirmed. Worsening transitions (and
//! the first acquisition out of Unknown) need `debounce_worsening_frames`;
//! recovering transitions need `debounce_recovering_frames`. A raw Unknown
//! frame leaves the whole tracker untouched.

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::types::{Direction, RuleStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceThresholds {
    pub worsening: u32,
    pub recovering: u32,
}

impl DebounceThresholds {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            worsening: config.debounce_worsening_frames.max(1),
            recovering: config.debounce_recovering_frames.max(1),
        }
    }

    /// Frames required to move from `confirmed` to `candidate`.
    fn required(&self, confirmed: RuleStatus, candidate: RuleStatus) -> u32 {
        match (confirmed.severity_rank(), candidate.severity_rank()) {
            (Some(from), Some(to)) if to < from => self.recovering,
            _ => self.worsening,
        }
    }
}

/// A confirmed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: RuleStatus,
    pub to: RuleStatus,
}

impl StatusTransition {
    pub fn is_recovery(&self) -> bool {
        matches!(
            (self.from.severity_rank(), self.to.severity_rank()),
            (Some(from), Some(to)) if to < from
        )
    }
}

/// Per-rule debounce tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDebounce {
    confirmed: RuleStatus,
    candidate: Option<RuleStatus>,
    count: u32,
    last_direction: Option<Direction>,
}

impl RuleDebounce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirmed(&self) -> RuleStatus {
        self.confirmed
    }

    pub fn candidate(&self) -> Option<(RuleStatus, u32)> {
        self.candidate.map(|c| (c, self.count))
    }

    /// Direction of the latest frame whose raw status matched the confirmed
    /// violation. Transient frames on the other side of the range do not
    /// overwrite it.
    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    /// Feed one raw status. Returns the transition if the confirmed status changed.
    pub fn update(
        &mut self,
        raw: RuleStatus,
        direction: Option<Direction>,
        thresholds: &DebounceThresholds,
    ) -> Option<StatusTransition> {
        if raw == RuleStatus::Unknown {
            return None;
        }
        let transition = self.advance(raw, thresholds);
        if raw == self.confirmed && direction.is_some() {
            self.last_direction = direction;
        }
        transition
    }

    fn advance(&mut self, raw: RuleStatus, thresholds: &DebounceThresholds) -> Option<StatusTransition> {
        if raw == self.confirmed {
            self.candidate = None;
            self.count = 0;
            return None;
        }

        if self.candidate == Some(raw) {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = Some(raw);
            self.count = 1;
        }

        if self.count >= thresholds.required(self.confirmed, raw) {
            let transition = StatusTransition { from: self.confirmed, to: raw };
            self.confirmed = raw;
            self.candidate = None;
            self.count = 0;
            Some(transition)
        } else {
            None
        }
    }
}
