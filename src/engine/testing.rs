//! Fixtures shared by the engine unit tests

use crate::pose::{PoseDefinition, PoseLibrary, RuleDefinition, RuleGeometry};
use crate::types::{AngleRange, BodyRegion, Landmark, LandmarkFrame, LandmarkId};

fn knee_pose(id: &str, ideal: (f64, f64), safety: (f64, f64)) -> PoseDefinition {
    PoseDefinition {
        id: id.to_string(),
        tier: 1,
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

/// `knee_hold` (straight knee) with `knee_bend` as its easier variant.
pub fn test_library() -> PoseLibrary {
    let mut hold = knee_pose("knee_hold", (170.0, 180.0), (150.0, 180.0));
    hold.easier = Some("knee_bend".to_string());
    let mut bend = knee_pose("knee_bend", (90.0, 120.0), (70.0, 140.0));
    bend.harder = Some("knee_hold".to_string());
    hold.tier = 2;
    PoseLibrary::new(vec![hold, bend]).expect("fixture library is valid")
}

/// Left leg posed so the knee angle is `angle_deg`.
pub fn knee_frame(sequence: u64, timestamp_ms: u64, angle_deg: f64, confidence: f64) -> LandmarkFrame {
    let a = angle_deg.to_radians();
    LandmarkFrame::new(sequence, timestamp_ms)
        .with_landmark(LandmarkId::LeftHip, Landmark::new(0.5, 0.3, 0.0, 0.95))
        .with_landmark(LandmarkId::LeftKnee, Landmark::new(0.5, 0.5, 0.0, confidence))
        .with_landmark(
            LandmarkId::LeftAnkle,
            Landmark::new(0.5 + 0.2 * a.sin(), 0.5 - 0.2 * a.cos(), 0.0, 0.95),
        )
}
