//! Pose definitions and the pose library
//!
//! A `PoseDefinition` is the ordered rule set for one held pose plus its
//! difficulty tier and links to easier/harder variants. Definitions are
//! validated when a library is built and never change afterwards; every
//! invariant violation is a `RuleConfigInvalid` error, never a silent clamp.
//!
//! ## Library file format
//!
//! ```toml
//! [[poses]]
//! id = "pranamasana"
//! tier = 1
//! harder = "hasta_uttanasana"
//!
//! [[poses.rules]]
//! id = "torso_vertical"
//! region = "spine"
//! weight = 2.0
//! ideal = { min = 0.0, max = 5.0 }
//! safety = { min = 0.0, max = 15.0 }
//! geometry = { kind = "alignment", from = ["left_hip", "right_hip"], to = ["left_shoulder", "right_shoulder"], reference = "vertical" }
//! ```

pub mod catalog;
pub mod profile;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::types::{AngleRange, BodyRegion, LandmarkId};

pub use profile::{ExperienceLevel, PractitionerProfile};

// ============================================================================
// Rule Geometry
// ============================================================================

/// Axis an alignment segment is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAxis {
    Vertical,
    Horizontal,
}

/// What a rule measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleGeometry {
    /// Angle at `points[1]` between the segments to `points[0]` and `points[2]`
    JointAngle { points: [LandmarkId; 3] },
    /// Deviation of the segment `centroid(from) -> centroid(to)` from an axis
    Alignment {
        from: Vec<LandmarkId>,
        to: Vec<LandmarkId>,
        reference: ReferenceAxis,
    },
}

impl RuleGeometry {
    /// Every landmark the rule reads, in definition order (may repeat).
    pub fn landmarks(&self) -> Vec<LandmarkId> {
        match self {
            RuleGeometry::JointAngle { points } => points.to_vec(),
            RuleGeometry::Alignment { from, to, .. } => from.iter().chain(to).copied().collect(),
        }
    }
}

// ============================================================================
// Rule / Pose Definitions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub region: BodyRegion,
    /// Severity weight used by the aggregate score (> 0)
    pub weight: f64,
    pub ideal: AngleRange,
    pub safety: AngleRange,
    pub geometry: RuleGeometry,
}

impl RuleDefinition {
    fn validate(&self, pose: &str) -> Result<()> {
        let invalid = |reason: String| EngineError::RuleConfigInvalid {
            pose: pose.to_string(),
            rule: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("rule id is empty".to_string()));
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(invalid(format!("weight must be a positive number (got {})", self.weight)));
        }
        if !self.ideal.is_well_formed() {
            return Err(invalid(format!("ideal range {} must be finite with min < max", self.ideal)));
        }
        if !self.safety.is_well_formed() {
            return Err(invalid(format!("safety range {} must be finite with min < max", self.safety)));
        }
        if !self.ideal.is_within(&self.safety) {
            return Err(invalid(format!(
                "ideal range {} is not contained in safety range {}",
                self.ideal, self.safety
            )));
        }

        match &self.geometry {
            RuleGeometry::JointAngle { points } => {
                let [a, b, c] = *points;
                if a == b || b == c || a == c {
                    return Err(invalid("joint angle needs three distinct landmarks".to_string()));
                }
                if self.safety.min < 0.0 || self.safety.max > 180.0 {
                    return Err(invalid(format!(
                        "joint angle ranges must lie within [0, 180] (safety {})",
                        self.safety
                    )));
                }
            }
            RuleGeometry::Alignment { from, to, .. } => {
                if from.is_empty() || to.is_empty() {
                    return Err(invalid("alignment landmark sets must be non-empty".to_string()));
                }
                let a: BTreeSet<_> = from.iter().collect();
                if a == to.iter().collect::<BTreeSet<_>>() {
                    return Err(invalid("alignment segment endpoints are identical".to_string()));
                }
                if self.safety.min < 0.0 || self.safety.max > 90.0 {
                    return Err(invalid(format!(
                        "alignment ranges must lie within [0, 90] (safety {})",
                        self.safety
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDefinition {
    pub id: String,
    /// Difficulty tier, 1 = easiest
    pub tier: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harder: Option<String>,
    /// Practitioner conditions for which this pose must not be started
    #[serde(default)]
    pub contraindications: Vec<String>,
    pub rules: Vec<RuleDefinition>,
}

impl PoseDefinition {
    /// Union of landmarks referenced by any rule.
    pub fn landmarks(&self) -> BTreeSet<LandmarkId> {
        self.rules.iter().flat_map(|r| r.geometry.landmarks()).collect()
    }

    pub fn rule(&self, id: &str) -> Option<&RuleDefinition> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Regions that have at least one rule, in stable order.
    pub fn regions(&self) -> BTreeSet<BodyRegion> {
        self.rules.iter().map(|r| r.region).collect()
    }

    pub fn is_contraindicated_for(&self, condition: &str) -> bool {
        let condition = condition.trim().to_lowercase();
        self.contraindications.iter().any(|c| c.to_lowercase() == condition)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |rule: &str, reason: &str| EngineError::RuleConfigInvalid {
            pose: self.id.clone(),
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("-", "pose id is empty"));
        }
        if self.tier == 0 {
            return Err(invalid("-", "tier must be >= 1"));
        }
        if self.rules.is_empty() {
            return Err(invalid("-", "pose has no rules"));
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            rule.validate(&self.id)?;
            if !seen.insert(rule.id.as_str()) {
                return Err(invalid(&rule.id, "duplicate rule id"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Pose Library
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
struct LibraryFile {
    #[serde(default)]
    poses: Vec<PoseDefinition>,
}

/// Validated, immutable collection of pose definitions keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseLibrary {
    poses: BTreeMap<String, PoseDefinition>,
}

impl PoseLibrary {
    /// Build a library, validating every pose, rule and variant link.
    pub fn new(poses: Vec<PoseDefinition>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for pose in poses {
            pose.validate()?;
            if map.contains_key(&pose.id) {
                return Err(EngineError::RuleConfigInvalid {
                    pose: pose.id.clone(),
                    rule: "-".to_string(),
                    reason: "duplicate pose id".to_string(),
                });
            }
            map.insert(pose.id.clone(), pose);
        }

        // Variant links must resolve inside the library
        for pose in map.values() {
            for link in pose.easier.iter().chain(pose.harder.iter()) {
                if !map.contains_key(link) {
                    return Err(EngineError::PoseUndefined(link.clone()));
                }
            }
        }

        Ok(Self { poses: map })
    }

    /// The built-in Surya Namaskar catalog.
    pub fn builtin() -> Result<Self> {
        Self::new(catalog::builtin_poses())
    }

    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, LibraryLoadError> {
        let file: LibraryFile = toml::from_str(contents).map_err(LibraryLoadError::Parse)?;
        Self::new(file.poses).map_err(LibraryLoadError::Invalid)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::LibraryIo {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::from_toml_str(&contents).map_err(|e| match e {
            LibraryLoadError::Parse(source) => EngineError::LibraryParse {
                path: path.to_path_buf(),
                source,
            },
            LibraryLoadError::Invalid(inner) => inner,
        })?;
        info!(path = %path.display(), poses = library.len(), "Loaded pose library");
        Ok(library)
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        let file = LibraryFile {
            poses: self.poses.values().cloned().collect(),
        };
        toml::to_string_pretty(&file)
    }

    pub fn get(&self, id: &str) -> Result<&PoseDefinition> {
        self.poses
            .get(id)
            .ok_or_else(|| EngineError::PoseUndefined(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.poses.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseDefinition> {
        self.poses.values()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Intermediate error for `PoseLibrary::from_toml_str`, which has no path.
#[derive(Debug, thiserror::Error)]
pub enum LibraryLoadError {
    #[error("Pose library parse error: {0}")]
    Parse(#[source] toml::de::Error),
    #[error(transparent)]
    Invalid(EngineError),
}
