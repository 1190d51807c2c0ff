//! Engine Configuration - every tunable threshold as an operator TOML value
//!
//! Each struct implements `Default` with the same values as its
//! `#[serde(default = "...")]` functions, so a missing file, a missing section
//! and a missing key all resolve to identical behaviour.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "POSEGUARD_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "poseguard.toml";

// ============================================================================
// Config Provenance
// ============================================================================

/// Dotted key paths the user explicitly set in their TOML file.
///
/// Lets `poseguard check` show which values are overrides and which are defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvenance {
    pub explicit_keys: HashSet<String>,
}

impl ConfigProvenance {
    pub fn is_user_set(&self, dotted_key: &str) -> bool {
        self.explicit_keys.contains(dotted_key)
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration, read once at session start and immutable afterwards.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$POSEGUARD_CONFIG` env var
/// 2. `./poseguard.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Debounce, rate limit and difficulty controller
    #[serde(default)]
    pub session: SessionConfig,

    /// Landmark confidence gating and smoothing
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    /// Feature extraction and motion-hazard limits
    #[serde(default)]
    pub features: FeatureConfig,

    /// Correction emission gating
    #[serde(default)]
    pub corrections: CorrectionConfig,

    /// Ingestion queue and latency budget
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$POSEGUARD_CONFIG` environment variable
    /// 2. `./poseguard.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        Self::load_with_provenance().0
    }

    /// Same search order as `load()`, also returning which keys were user-set.
    pub fn load_with_provenance() -> (Self, ConfigProvenance) {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file_with_provenance(&p) {
                    Ok((config, provenance)) => {
                        info!(path = %p.display(), "Loaded engine config from {CONFIG_ENV_VAR}");
                        return (config, provenance);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        // 2. Check ./poseguard.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file_with_provenance(&local) {
                Ok((config, provenance)) => {
                    info!("Loaded engine config from ./{LOCAL_CONFIG_FILE}");
                    return (config, provenance);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        (Self::default(), ConfigProvenance::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let (config, _provenance) = Self::load_from_file_with_provenance(path)?;
        Ok(config)
    }

    /// Load from a specific TOML file path, also returning provenance.
    pub fn load_from_file_with_provenance(
        path: &Path,
    ) -> Result<(Self, ConfigProvenance), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let (config, provenance) = Self::parse_with_provenance(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
                other => other,
            })?;
        Ok((config, provenance))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse_with_provenance(contents).map(|(config, _)| config)
    }

    fn parse_with_provenance(contents: &str) -> Result<(Self, ConfigProvenance), ConfigError> {
        // Two-pass: unknown keys first (warnings only)
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let provenance = ConfigProvenance {
            explicit_keys: contents
                .parse::<toml::Value>()
                .map(|v| super::validation::walk_toml_keys(&v, ""))
                .unwrap_or_default()
                .into_iter()
                .collect(),
        };

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok((config, provenance))
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the config to a file (used by `poseguard check --write-defaults`).
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Validate all values for internal consistency. Collects every problem
    /// instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Reject NaN/Inf first; comparisons below silently pass on NaN
        for (name, value) in self.float_fields() {
            if !value.is_finite() {
                errors.push(format!("{name} must be a finite number (got {value})"));
            }
        }

        let s = &self.session;
        if s.debounce_worsening_frames == 0 {
            errors.push("session.debounce_worsening_frames must be >= 1".to_string());
        }
        if s.debounce_recovering_frames == 0 {
            errors.push("session.debounce_recovering_frames must be >= 1".to_string());
        }
        if s.rate_limit_seconds < 0.0 {
            errors.push(format!(
                "session.rate_limit_seconds ({:.2}) cannot be negative",
                s.rate_limit_seconds
            ));
        }
        if s.difficulty_window_frames == 0 {
            errors.push("session.difficulty_window_frames must be >= 1".to_string());
        }
        Self::check_fraction(s.simplify_threshold, "session.simplify_threshold", &mut errors);
        Self::check_fraction(s.advance_threshold, "session.advance_threshold", &mut errors);
        if s.cooldown_seconds < 0.0 {
            errors.push(format!(
                "session.cooldown_seconds ({:.2}) cannot be negative",
                s.cooldown_seconds
            ));
        }

        let p = &self.preprocessing;
        Self::check_fraction(
            p.confidence_threshold,
            "preprocessing.confidence_threshold",
            &mut errors,
        );
        if !(p.smoothing_factor > 0.0 && p.smoothing_factor <= 1.0) {
            errors.push(format!(
                "preprocessing.smoothing_factor ({:.3}) must be in (0, 1]",
                p.smoothing_factor
            ));
        }

        let f = &self.features;
        if f.max_landmark_speed <= 0.0 {
            errors.push("features.max_landmark_speed must be > 0".to_string());
        }
        if f.max_angular_speed_deg <= 0.0 {
            errors.push("features.max_angular_speed_deg must be > 0".to_string());
        }

        Self::check_fraction(
            self.corrections.min_region_coverage,
            "corrections.min_region_coverage",
            &mut errors,
        );

        let r = &self.runtime;
        if !(1..=2).contains(&r.queue_depth) {
            errors.push(format!(
                "runtime.queue_depth ({}) must be 1 or 2",
                r.queue_depth
            ));
        }
        if r.frame_budget_ms == 0 {
            errors.push("runtime.frame_budget_ms must be > 0".to_string());
        }

        // Suspicious-but-legal combinations
        let (range_errors, range_warnings) = super::validation::validate_tuning_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
        if !value.is_finite() {
            return; // reported by the finiteness sweep
        }
        if !(0.0..=1.0).contains(&value) {
            errors.push(format!("{name} ({value:.3}) must be within [0, 1]"));
        }
    }

    fn float_fields(&self) -> [(&'static str, f64); 10] {
        [
            ("session.rate_limit_seconds", self.session.rate_limit_seconds),
            ("session.simplify_threshold", self.session.simplify_threshold),
            ("session.advance_threshold", self.session.advance_threshold),
            ("session.cooldown_seconds", self.session.cooldown_seconds),
            ("preprocessing.confidence_threshold", self.preprocessing.confidence_threshold),
            ("preprocessing.smoothing_factor", self.preprocessing.smoothing_factor),
            ("features.max_landmark_speed", self.features.max_landmark_speed),
            ("features.max_angular_speed_deg", self.features.max_angular_speed_deg),
            ("corrections.min_region_coverage", self.corrections.min_region_coverage),
            ("runtime.frame_budget_ms", self.runtime.frame_budget_ms as f64),
        ]
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Session
// ============================================================================

/// Per-session hysteresis, rate limiting and difficulty adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Consecutive frames required to confirm a worsening transition
    /// (and the first acquisition out of Unknown)
    #[serde(default = "default_debounce_worsening")]
    pub debounce_worsening_frames: u32,

    /// Consecutive frames required to confirm a recovering transition
    #[serde(default = "default_debounce_recovering")]
    pub debounce_recovering_frames: u32,

    /// Minimum time between corrections for the same body region
    #[serde(default = "default_rate_limit_seconds")]
    pub rate_limit_seconds: f64,

    /// Difficulty controller ring-buffer length (frames)
    #[serde(default = "default_difficulty_window")]
    pub difficulty_window_frames: usize,

    /// Fraction of critical frames above which the pose is simplified
    #[serde(default = "default_simplify_threshold")]
    pub simplify_threshold: f64,

    /// Minimum per-frame coverage for every frame of a clean window to advance
    #[serde(default = "default_advance_threshold")]
    pub advance_threshold: f64,

    /// Lockout after a difficulty decision
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Switch to the linked variant when a decision is emitted
    #[serde(default = "default_apply_variant_changes")]
    pub apply_variant_changes: bool,
}

fn default_debounce_worsening() -> u32 { 3 }
fn default_debounce_recovering() -> u32 { 8 }
fn default_rate_limit_seconds() -> f64 { 2.0 }
fn default_difficulty_window() -> usize { 150 }
fn default_simplify_threshold() -> f64 { 0.6 }
fn default_advance_threshold() -> f64 { 0.9 }
fn default_cooldown_seconds() -> f64 { 10.0 }
fn default_apply_variant_changes() -> bool { true }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_worsening_frames: default_debounce_worsening(),
            debounce_recovering_frames: default_debounce_recovering(),
            rate_limit_seconds: default_rate_limit_seconds(),
            difficulty_window_frames: default_difficulty_window(),
            simplify_threshold: default_simplify_threshold(),
            advance_threshold: default_advance_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
            apply_variant_changes: default_apply_variant_changes(),
        }
    }
}

impl SessionConfig {
    pub fn rate_limit_ms(&self) -> u64 {
        seconds_to_ms(self.rate_limit_seconds)
    }

    pub fn cooldown_ms(&self) -> u64 {
        seconds_to_ms(self.cooldown_seconds)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

// ============================================================================
// Preprocessing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Landmarks below this confidence are held/extrapolated instead of measured
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Exponential smoothing factor (weight of the new measurement)
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,

    /// Consecutive low-confidence frames a landmark may be extrapolated
    #[serde(default = "default_max_extrapolation_frames")]
    pub max_extrapolation_frames: u32,
}

fn default_confidence_threshold() -> f64 { 0.5 }
fn default_smoothing_factor() -> f64 { 0.3 }
fn default_max_extrapolation_frames() -> u32 { 5 }

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            smoothing_factor: default_smoothing_factor(),
            max_extrapolation_frames: default_max_extrapolation_frames(),
        }
    }
}

// ============================================================================
// Features
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Measure joint angles in 3D using landmark depth instead of the image plane
    #[serde(default)]
    pub use_depth: bool,

    /// Landmark speed that raises the motion hazard (normalized units / s)
    #[serde(default = "default_max_landmark_speed")]
    pub max_landmark_speed: f64,

    /// Rule angle rate that raises the motion hazard (degrees / s)
    #[serde(default = "default_max_angular_speed")]
    pub max_angular_speed_deg: f64,
}

fn default_max_landmark_speed() -> f64 { 3.0 }
fn default_max_angular_speed() -> f64 { 400.0 }

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            use_depth: false,
            max_landmark_speed: default_max_landmark_speed(),
            max_angular_speed_deg: default_max_angular_speed(),
        }
    }
}

// ============================================================================
// Corrections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Fraction of a region's rules that must be valid this frame to emit
    #[serde(default = "default_min_region_coverage")]
    pub min_region_coverage: f64,
}

fn default_min_region_coverage() -> f64 { 0.5 }

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_region_coverage: default_min_region_coverage(),
        }
    }
}

// ============================================================================
// Runtime
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Ingestion queue depth (1 or 2); pushing into a full queue drops the oldest
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Per-frame processing budget (ms)
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,
}

fn default_queue_depth() -> usize { 2 }
fn default_frame_budget_ms() -> u64 { 33 }

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            frame_budget_ms: default_frame_budget_ms(),
        }
    }
}
