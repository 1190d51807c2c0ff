//! Stage 1: Landmark Preprocessor
//!
//! Confidence gating, exponential smoothing and short-gap extrapolation of
//! raw landmark positions. Velocities use the true capture-timestamp delta
//! between frames, so dropped frames and jitter never bias them.
//!
//! A landmark below the confidence threshold (or missing from the frame) is
//! carried forward along its last velocity for up to
//! `max_extrapolation_frames` consecutive frames. The next low-confidence
//! frame marks it `Unusable` until a confident measurement arrives again.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::defaults::MIN_ELAPSED_SECS;
use crate::config::PreprocessingConfig;
use crate::types::{LandmarkFrame, LandmarkId, Point3};

/// How a smoothed landmark position was obtained this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkQuality {
    /// Confident measurement blended into the smoothed track
    Measured,
    /// Held or extrapolated through a short low-confidence gap
    Extrapolated,
    /// Too long without a confident measurement; must not be used
    Unusable,
}

impl LandmarkQuality {
    pub const fn is_usable(self) -> bool {
        !matches!(self, LandmarkQuality::Unusable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedLandmark {
    pub position: Point3,
    /// Normalized units per second
    pub velocity: Point3,
    pub quality: LandmarkQuality,
}

/// Preprocessor output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedFrame {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub landmarks: BTreeMap<LandmarkId, SmoothedLandmark>,
}

impl SmoothedFrame {
    /// Position of a landmark that may be used for features.
    pub fn usable(&self, id: LandmarkId) -> Option<Point3> {
        self.landmarks
            .get(&id)
            .filter(|l| l.quality.is_usable())
            .map(|l| l.position)
    }

    pub fn count(&self, quality: LandmarkQuality) -> usize {
        self.landmarks.values().filter(|l| l.quality == quality).count()
    }
}

// ============================================================================
// Smoothing State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Track {
    position: Point3,
    velocity: Point3,
    /// Consecutive frames without a confident measurement
    low_confidence_run: u32,
    usable: bool,
}

/// Cross-frame preprocessor state, owned by the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothingState {
    tracks: BTreeMap<LandmarkId, Track>,
    last_timestamp_ms: Option<u64>,
}

impl SmoothingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.last_timestamp_ms = None;
    }

    /// Consecutive low-confidence frames for a landmark (0 if confident or never seen).
    pub fn low_confidence_run(&self, id: LandmarkId) -> u32 {
        self.tracks.get(&id).map_or(0, |t| t.low_confidence_run)
    }
}

// ============================================================================
// Preprocess
// ============================================================================

/// Clean one frame. `tracked` is the set of landmarks the current pose reads;
/// landmarks present in the frame are processed too so that their tracks stay
/// warm across pose switches.
pub fn preprocess(
    frame: &LandmarkFrame,
    tracked: &BTreeSet<LandmarkId>,
    state: &mut SmoothingState,
    config: &PreprocessingConfig,
) -> SmoothedFrame {
    let elapsed = state.last_timestamp_ms.and_then(|last| {
        let dt = frame.timestamp_ms.saturating_sub(last) as f64 / 1000.0;
        (dt >= MIN_ELAPSED_SECS).then_some(dt)
    });
    let alpha = config.smoothing_factor;
    let max_gap = config.max_extrapolation_frames;

    let ids: BTreeSet<LandmarkId> = tracked
        .iter()
        .copied()
        .chain(frame.landmarks.keys().copied())
        .collect();

    let mut landmarks = BTreeMap::new();
    for id in ids {
        let confident = frame
            .get(id)
            .filter(|l| l.confidence >= config.confidence_threshold)
            .map(|l| l.position())
            .filter(|p| p.is_finite());
        let previous = state.tracks.get(&id).copied();

        let (track, quality) = match (confident, previous) {
            (Some(raw), Some(prev)) if prev.usable => {
                let position = prev.position.lerp(raw, alpha);
                let velocity = elapsed
                    .map_or(prev.velocity, |dt| position.sub(prev.position).scale(1.0 / dt));
                (
                    Track { position, velocity, low_confidence_run: 0, usable: true },
                    LandmarkQuality::Measured,
                )
            }
            (Some(raw), _) => (
                Track { position: raw, velocity: Point3::ZERO, low_confidence_run: 0, usable: true },
                LandmarkQuality::Measured,
            ),
            (None, Some(prev)) if prev.usable && prev.low_confidence_run < max_gap => {
                let position = prev.position.add(prev.velocity.scale(elapsed.unwrap_or(0.0)));
                (
                    Track {
                        position,
                        velocity: prev.velocity,
                        low_confidence_run: prev.low_confidence_run + 1,
                        usable: true,
                    },
                    LandmarkQuality::Extrapolated,
                )
            }
            (None, Some(prev)) => (
                Track {
                    position: prev.position,
                    velocity: Point3::ZERO,
                    low_confidence_run: prev.low_confidence_run.saturating_add(1),
                    usable: false,
                },
                LandmarkQuality::Unusable,
            ),
            (None, None) => {
                // Never confidently seen: nothing to hold
                let position = frame.get(id).map_or(Point3::ZERO, |l| l.position());
                (
                    Track { position, velocity: Point3::ZERO, low_confidence_run: 1, usable: false },
                    LandmarkQuality::Unusable,
                )
            }
        };

        state.tracks.insert(id, track);
        landmarks.insert(
            id,
            SmoothedLandmark {
                position: track.position,
                velocity: track.velocity,
                quality,
            },
        );
    }

    state.last_timestamp_ms = Some(frame.timestamp_ms);

    SmoothedFrame {
        sequence: frame.sequence,
        timestamp_ms: frame.timestamp_ms,
        landmarks,
    }
}
