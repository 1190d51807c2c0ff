//! Practitioner profile and per-practitioner rule adaptation

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::PoseDefinition;
use crate::config::defaults::{
    ADVANCED_TOLERANCE_DEG, BEGINNER_TOLERANCE_DEG, INTERMEDIATE_TOLERANCE_DEG, MIN_IDEAL_WIDTH_DEG,
};
use crate::error::{EngineError, Result};
use crate::types::AngleRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    /// Degrees added to each adjustable side of an ideal range (negative narrows).
    pub const fn angle_tolerance(self) -> f64 {
        match self {
            ExperienceLevel::Beginner => BEGINNER_TOLERANCE_DEG,
            ExperienceLevel::Intermediate => INTERMEDIATE_TOLERANCE_DEG,
            ExperienceLevel::Advanced => ADVANCED_TOLERANCE_DEG,
        }
    }
}

impl std::str::FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(ExperienceLevel::Beginner),
            "intermediate" => Ok(ExperienceLevel::Intermediate),
            "advanced" => Ok(ExperienceLevel::Advanced),
            other => Err(format!("unknown experience level '{other}'")),
        }
    }
}

/// Who is practising: experience level and declared health conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerProfile {
    #[serde(default)]
    pub level: ExperienceLevel,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl PractitionerProfile {
    pub fn new(level: ExperienceLevel, conditions: Vec<String>) -> Self {
        Self {
            level,
            conditions: conditions
                .into_iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// First declared condition the pose is contraindicated for.
    pub fn contraindication<'a>(&'a self, pose: &PoseDefinition) -> Option<&'a str> {
        self.conditions
            .iter()
            .map(String::as_str)
            .find(|c| pose.is_contraindicated_for(c))
    }

    /// Personalise a pose for this practitioner.
    ///
    /// Refuses contraindicated poses. Otherwise every ideal range is widened or
    /// narrowed by the level tolerance on each side that is not already at the
    /// safety bound. Safety ranges are never changed.
    pub fn adapt(&self, pose: &PoseDefinition) -> Result<PoseDefinition> {
        if let Some(condition) = self.contraindication(pose) {
            warn!(pose = %pose.id, condition, "Pose refused: contraindicated");
            return Err(EngineError::PoseContraindicated {
                pose: pose.id.clone(),
                condition: condition.to_string(),
            });
        }

        let tolerance = self.level.angle_tolerance();
        let mut adapted = pose.clone();
        for rule in &mut adapted.rules {
            let before = rule.ideal;
            rule.ideal = adjust_ideal(rule.ideal, rule.safety, tolerance);
            if rule.ideal != before {
                debug!(pose = %pose.id, rule = %rule.id, from = %before, to = %rule.ideal, "Ideal range adapted");
            }
        }
        Ok(adapted)
    }
}

fn adjust_ideal(ideal: AngleRange, safety: AngleRange, tolerance: f64) -> AngleRange {
    let move_min = ideal.min > safety.min;
    let move_max = ideal.max < safety.max;

    if tolerance >= 0.0 {
        let min = if move_min { (ideal.min - tolerance).max(safety.min) } else { ideal.min };
        let max = if move_max { (ideal.max + tolerance).min(safety.max) } else { ideal.max };
        return AngleRange::new(min, max);
    }

    let sides = u8::from(move_min) + u8::from(move_max);
    if sides == 0 {
        return ideal;
    }
    let slack = (ideal.width() - MIN_IDEAL_WIDTH_DEG).max(0.0);
    let step = (-tolerance).min(slack / f64::from(sides));
    let min = if move_min { ideal.min + step } else { ideal.min };
    let max = if move_max { ideal.max - step } else { ideal.max };
    AngleRange::new(min, max)
}
