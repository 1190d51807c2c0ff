//! Per-region correction cooldown tracker

use std::collections::BTreeMap;

use crate::types::BodyRegion;

/// Prevents correction spam by enforcing a minimum interval per body region.
///
/// Time is the frame capture timestamp, never the processing clock, so replays
/// and live sessions rate-limit identically.
#[derive(Debug, Clone, Default)]
pub struct RegionRateLimiter {
    window_ms: u64,
    last_emission: BTreeMap<BodyRegion, u64>,
}

impl RegionRateLimiter {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_emission: BTreeMap::new(),
        }
    }

    /// Check whether a correction for this region may be emitted at `now_ms`.
    pub fn can_emit(&self, region: BodyRegion, now_ms: u64) -> bool {
        match self.last_emission.get(&region) {
            None => true,
            Some(&last) => now_ms.saturating_sub(last) >= self.window_ms,
        }
    }

    /// Record that a correction was emitted for this region.
    pub fn record(&mut self, region: BodyRegion, now_ms: u64) {
        self.last_emission.insert(region, now_ms);
    }

    pub fn last_emission(&self, region: BodyRegion) -> Option<u64> {
        self.last_emission.get(&region).copied()
    }
}
