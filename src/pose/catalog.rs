//! Built-in Surya Namaskar pose catalog
//!
//! Ranges follow the classical minimum-angle cues for each asana (straight
//! knees and elbows in Parvatasana, 80-110° front knee in Ashwa
//! Sanchalanasana, a 10-15° back extension in the arching poses) with a
//! safety margin beyond which the posture is considered harmful.

use super::{PoseDefinition, ReferenceAxis, RuleDefinition, RuleGeometry};
use crate::types::{AngleRange, BodyRegion, LandmarkId};

use LandmarkId::{
    LeftAnkle, LeftElbow, LeftHip, LeftKnee, LeftShoulder, LeftWrist, RightAnkle, RightElbow,
    RightHip, RightKnee, RightShoulder, RightWrist,
};

const HIPS: [LandmarkId; 2] = [LeftHip, RightHip];
const SHOULDERS: [LandmarkId; 2] = [LeftShoulder, RightShoulder];

const KNEE_WEIGHT: f64 = 1.5;
const ARM_WEIGHT: f64 = 1.0;
const SPINE_WEIGHT: f64 = 2.0;

fn joint(
    id: &str,
    region: BodyRegion,
    weight: f64,
    points: [LandmarkId; 3],
    ideal: (f64, f64),
    safety: (f64, f64),
) -> RuleDefinition {
    RuleDefinition {
        id: id.to_string(),
        region,
        weight,
        ideal: AngleRange::new(ideal.0, ideal.1),
        safety: AngleRange::new(safety.0, safety.1),
        geometry: RuleGeometry::JointAngle { points },
    }
}

fn torso(id: &str, reference: ReferenceAxis, ideal: (f64, f64), safety: (f64, f64)) -> RuleDefinition {
    RuleDefinition {
        id: id.to_string(),
        region: BodyRegion::Spine,
        weight: SPINE_WEIGHT,
        ideal: AngleRange::new(ideal.0, ideal.1),
        safety: AngleRange::new(safety.0, safety.1),
        geometry: RuleGeometry::Alignment {
            from: HIPS.to_vec(),
            to: SHOULDERS.to_vec(),
            reference,
        },
    }
}

fn straight_knees(ideal_min: f64, safety_min: f64) -> [RuleDefinition; 2] {
    [
        joint("left_knee", BodyRegion::Knees, KNEE_WEIGHT, [LeftHip, LeftKnee, LeftAnkle], (ideal_min, 180.0), (safety_min, 180.0)),
        joint("right_knee", BodyRegion::Knees, KNEE_WEIGHT, [RightHip, RightKnee, RightAnkle], (ideal_min, 180.0), (safety_min, 180.0)),
    ]
}

fn straight_elbows(ideal_min: f64, safety_min: f64) -> [RuleDefinition; 2] {
    [
        joint("left_elbow", BodyRegion::Arms, ARM_WEIGHT, [LeftShoulder, LeftElbow, LeftWrist], (ideal_min, 180.0), (safety_min, 180.0)),
        joint("right_elbow", BodyRegion::Arms, ARM_WEIGHT, [RightShoulder, RightElbow, RightWrist], (ideal_min, 180.0), (safety_min, 180.0)),
    ]
}

/// Prayer pose: upright, shoulders level.
fn pranamasana() -> PoseDefinition {
    PoseDefinition {
        id: "pranamasana".to_string(),
        tier: 1,
        easier: None,
        harder: Some("hasta_uttanasana".to_string()),
        contraindications: vec![],
        rules: vec![
            torso("torso_vertical", ReferenceAxis::Vertical, (0.0, 5.0), (0.0, 15.0)),
            RuleDefinition {
                id: "shoulders_level".to_string(),
                region: BodyRegion::Shoulders,
                weight: ARM_WEIGHT,
                ideal: AngleRange::new(0.0, 5.0),
                safety: AngleRange::new(0.0, 12.0),
                geometry: RuleGeometry::Alignment {
                    from: vec![LeftShoulder],
                    to: vec![RightShoulder],
                    reference: ReferenceAxis::Horizontal,
                },
            },
        ],
    }
}

/// Raised arms pose: straight arms overhead with a gentle back arch.
fn hasta_uttanasana() -> PoseDefinition {
    let mut rules = straight_elbows(165.0, 140.0).to_vec();
    rules.push(torso("spine_extension", ReferenceAxis::Vertical, (10.0, 30.0), (0.0, 45.0)));
    PoseDefinition {
        id: "hasta_uttanasana".to_string(),
        tier: 2,
        easier: Some("pranamasana".to_string()),
        harder: Some("ashwa_sanchalanasana".to_string()),
        contraindications: vec![],
        rules,
    }
}

/// Equestrian pose: front knee near a right angle, back leg long, chest lifted.
fn ashwa_sanchalanasana() -> PoseDefinition {
    PoseDefinition {
        id: "ashwa_sanchalanasana".to_string(),
        tier: 3,
        easier: Some("hasta_uttanasana".to_string()),
        harder: Some("parvatasana".to_string()),
        contraindications: vec![],
        rules: vec![
            joint("front_knee", BodyRegion::Knees, KNEE_WEIGHT, [LeftHip, LeftKnee, LeftAnkle], (80.0, 110.0), (65.0, 130.0)),
            joint("back_knee", BodyRegion::Knees, KNEE_WEIGHT, [RightHip, RightKnee, RightAnkle], (160.0, 180.0), (140.0, 180.0)),
            torso("spine_extension", ReferenceAxis::Vertical, (10.0, 40.0), (0.0, 60.0)),
        ],
    }
}

/// Cobra pose: chest lifted off the floor on mostly straight arms.
fn bhujangasana() -> PoseDefinition {
    let mut rules = straight_elbows(150.0, 120.0).to_vec();
    rules.push(torso("spine_extension", ReferenceAxis::Horizontal, (15.0, 50.0), (5.0, 70.0)));
    PoseDefinition {
        id: "bhujangasana".to_string(),
        tier: 3,
        easier: None,
        harder: None,
        contraindications: vec!["recent_spinal_surgery".to_string(), "back_pain".to_string()],
        rules,
    }
}

/// Mountain (downward dog) pose: straight limbs, hips lifted above shoulders.
fn parvatasana() -> PoseDefinition {
    let mut rules = straight_knees(170.0, 150.0).to_vec();
    rules.extend(straight_elbows(170.0, 150.0));
    rules.push(torso("hip_elevation", ReferenceAxis::Horizontal, (30.0, 60.0), (15.0, 75.0)));
    PoseDefinition {
        id: "parvatasana".to_string(),
        tier: 4,
        easier: Some("ashwa_sanchalanasana".to_string()),
        harder: None,
        contraindications: vec!["high_bp".to_string(), "heart_ailments".to_string()],
        rules,
    }
}

/// All built-in poses, easiest first.
pub fn builtin_poses() -> Vec<PoseDefinition> {
    vec![
        pranamasana(),
        hasta_uttanasana(),
        ashwa_sanchalanasana(),
        bhujangasana(),
        parvatasana(),
    ]
}
