//! Shared fixtures for the integration tests

#![allow(dead_code)]

use poseguard::config::EngineConfig;
use poseguard::engine::PoseSession;
use poseguard::pose::{PoseDefinition, RuleDefinition, RuleGeometry};
use poseguard::types::{AngleRange, BodyRegion, Landmark, LandmarkFrame, LandmarkId};
use poseguard::{EngineEvent, PoseLibrary, PractitionerProfile};
use std::sync::Arc;

/// Frame spacing used by the scenarios
pub const FRAME_MS: u64 = 100;

/// Knee angle that is Ok for `knee_hold` at every experience level
pub const OK_ANGLE: f64 = 178.0;
/// Knee angle outside `knee_hold`'s safety range
pub const CRITICAL_ANGLE: f64 = 145.0;

fn knee_pose(id: &str, tier: u8, ideal: (f64, f64), safety: (f64, f64)) -> PoseDefinition {
    PoseDefinition {
        id: id.to_string(),
        tier,
        easier: None,
        harder: None,
        contraindications: vec![],
        rules: vec![RuleDefinition {
            id: "knee".to_string(),
            region: BodyRegion::Knees,
            weight: 1.5,
            ideal: AngleRange::new(ideal.0, ideal.1),
            safety: AngleRange::new(safety.0, safety.1),
            geometry: RuleGeometry::JointAngle {
                points: [LandmarkId::LeftHip, LandmarkId::LeftKnee, LandmarkId::LeftAnkle],
            },
        }],
    }
}

/// `knee_hold` (straight knee, tier 2) linked to an easier `knee_bend`.
pub fn knee_library() -> PoseLibrary {
    let mut hold = knee_pose("knee_hold", 2, (170.0, 180.0), (150.0, 180.0));
    hold.easier = Some("knee_bend".to_string());
    let mut bend = knee_pose("knee_bend", 1, (90.0, 120.0), (70.0, 140.0));
    bend.harder = Some("knee_hold".to_string());
    PoseLibrary::new(vec![hold, bend]).expect("fixture library is valid")
}

/// Left leg posed so the knee angle is `angle_deg`.
pub fn knee_frame(sequence: u64, angle_deg: f64, knee_confidence: f64) -> LandmarkFrame {
    let a = angle_deg.to_radians();
    LandmarkFrame::new(sequence, sequence * FRAME_MS)
        .with_landmark(LandmarkId::LeftHip, Landmark::new(0.5, 0.3, 0.0, 0.95))
        .with_landmark(LandmarkId::LeftKnee, Landmark::new(0.5, 0.5, 0.0, knee_confidence))
        .with_landmark(
            LandmarkId::LeftAnkle,
            Landmark::new(0.5 + 0.2 * a.sin(), 0.5 - 0.2 * a.cos(), 0.0, 0.95),
        )
}

/// Default config without positional smoothing, so status changes land on
/// the exact frame the input changes.
pub fn unsmoothed_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.preprocessing.smoothing_factor = 1.0;
    config
}

pub fn start(pose: &str, config: EngineConfig) -> PoseSession {
    PoseSession::start(
        Arc::new(knee_library()),
        pose,
        PractitionerProfile::default(),
        Arc::new(config),
    )
    .expect("session starts")
}

pub fn corrections(events: &[EngineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Correction(_)))
        .count()
}
