//! Landmark frame types (vision collaborator input)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Landmark Identifiers
// ============================================================================

/// Anatomical landmark tracked by the vision collaborator.
///
/// Subset of the 33-point MediaPipe Pose topology that pose rules can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkId {
    Nose,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkId {
    pub const ALL: [LandmarkId; 19] = [
        LandmarkId::Nose,
        LandmarkId::LeftEar,
        LandmarkId::RightEar,
        LandmarkId::LeftShoulder,
        LandmarkId::RightShoulder,
        LandmarkId::LeftElbow,
        LandmarkId::RightElbow,
        LandmarkId::LeftWrist,
        LandmarkId::RightWrist,
        LandmarkId::LeftHip,
        LandmarkId::RightHip,
        LandmarkId::LeftKnee,
        LandmarkId::RightKnee,
        LandmarkId::LeftAnkle,
        LandmarkId::RightAnkle,
        LandmarkId::LeftHeel,
        LandmarkId::RightHeel,
        LandmarkId::LeftFootIndex,
        LandmarkId::RightFootIndex,
    ];

    /// MediaPipe Pose landmark index for this point.
    pub const fn mediapipe_index(self) -> usize {
        match self {
            LandmarkId::Nose => 0,
            LandmarkId::LeftEar => 7,
            LandmarkId::RightEar => 8,
            LandmarkId::LeftShoulder => 11,
            LandmarkId::RightShoulder => 12,
            LandmarkId::LeftElbow => 13,
            LandmarkId::RightElbow => 14,
            LandmarkId::LeftWrist => 15,
            LandmarkId::RightWrist => 16,
            LandmarkId::LeftHip => 23,
            LandmarkId::RightHip => 24,
            LandmarkId::LeftKnee => 25,
            LandmarkId::RightKnee => 26,
            LandmarkId::LeftAnkle => 27,
            LandmarkId::RightAnkle => 28,
            LandmarkId::LeftHeel => 29,
            LandmarkId::RightHeel => 30,
            LandmarkId::LeftFootIndex => 31,
            LandmarkId::RightFootIndex => 32,
        }
    }

    /// Reverse lookup from a MediaPipe index. Untracked indices (eyes, mouth,
    /// fingers) return `None`.
    pub fn from_mediapipe_index(index: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.mediapipe_index() == index)
    }

    pub const fn name(self) -> &'static str {
        match self {
            LandmarkId::Nose => "nose",
            LandmarkId::LeftEar => "left_ear",
            LandmarkId::RightEar => "right_ear",
            LandmarkId::LeftShoulder => "left_shoulder",
            LandmarkId::RightShoulder => "right_shoulder",
            LandmarkId::LeftElbow => "left_elbow",
            LandmarkId::RightElbow => "right_elbow",
            LandmarkId::LeftWrist => "left_wrist",
            LandmarkId::RightWrist => "right_wrist",
            LandmarkId::LeftHip => "left_hip",
            LandmarkId::RightHip => "right_hip",
            LandmarkId::LeftKnee => "left_knee",
            LandmarkId::RightKnee => "right_knee",
            LandmarkId::LeftAnkle => "left_ankle",
            LandmarkId::RightAnkle => "right_ankle",
            LandmarkId::LeftHeel => "left_heel",
            LandmarkId::RightHeel => "right_heel",
            LandmarkId::LeftFootIndex => "left_foot_index",
            LandmarkId::RightFootIndex => "right_foot_index",
        }
    }
}

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Point in normalized image coordinates (x right, y down) with relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ZERO: Point3 = Point3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(self, other: Point3) -> Point3 {
        Point3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(self, other: Point3) -> Point3 {
        Point3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(self, k: f64) -> Point3 {
        Point3::new(self.x * k, self.y * k, self.z * k)
    }

    /// Linear interpolation towards `target` by `alpha` (0 = self, 1 = target).
    pub fn lerp(self, target: Point3, alpha: f64) -> Point3 {
        self.add(target.sub(self).scale(alpha))
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Point3) -> f64 {
        self.sub(other).norm()
    }

    /// Drop the depth component (image-plane projection).
    pub fn planar(self) -> Point3 {
        Point3::new(self.x, self.y, 0.0)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Centroid of a set of points. Returns `None` for an empty set.
    pub fn centroid<I: IntoIterator<Item = Point3>>(points: I) -> Option<Point3> {
        let mut sum = Point3::ZERO;
        let mut n = 0usize;
        for p in points {
            sum = sum.add(p);
            n += 1;
        }
        if n == 0 {
            None
        } else {
            Some(sum.scale(1.0 / n as f64))
        }
    }
}

// ============================================================================
// Landmark Frame
// ============================================================================

/// One raw landmark measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Detection confidence in [0, 1]
    pub confidence: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64, confidence: f64) -> Self {
        Self { x, y, z, confidence }
    }

    pub const fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// All landmarks detected in one camera frame.
///
/// Produced once per frame by the vision collaborator. `timestamp_ms` is the
/// capture wall-clock time; every time-based computation in the engine uses
/// deltas between these timestamps, never an assumed frame rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub sequence: u64,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkId, Landmark>,
}

impl LandmarkFrame {
    pub fn new(sequence: u64, timestamp_ms: u64) -> Self {
        Self {
            sequence,
            timestamp_ms,
            landmarks: BTreeMap::new(),
        }
    }

    /// Builder-style insert, used by sources and tests.
    pub fn with_landmark(mut self, id: LandmarkId, landmark: Landmark) -> Self {
        self.landmarks.insert(id, landmark);
        self
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }
}
