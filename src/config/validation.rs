//! Engine config checks that go beyond serde
//!
//! `poseguard.toml` is read twice. The first pass walks it as a plain
//! `toml::Value` and flags keys that `EngineConfig` does not know, with the
//! nearest known key as a hint. The second pass is the typed parse. A typo
//! such as `debounce_worsenning_frames` therefore warns instead of silently
//! falling back to the default. Tuning checks flag combinations that are
//! legal but almost certainly unintended.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Complete set of valid dotted key paths for `EngineConfig`.
///
/// Any new field added to `EngineConfig` must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [session]
        "session",
        "session.debounce_worsening_frames",
        "session.debounce_recovering_frames",
        "session.rate_limit_seconds",
        "session.difficulty_window_frames",
        "session.simplify_threshold",
        "session.advance_threshold",
        "session.cooldown_seconds",
        "session.apply_variant_changes",
        // [preprocessing]
        "preprocessing",
        "preprocessing.confidence_threshold",
        "preprocessing.smoothing_factor",
        "preprocessing.max_extrapolation_frames",
        // [features]
        "features",
        "features.use_depth",
        "features.max_landmark_speed",
        "features.max_angular_speed_deg",
        // [corrections]
        "corrections",
        "corrections.min_region_coverage",
        // [runtime]
        "runtime",
        "runtime.queue_depth",
        "runtime.frame_budget_ms",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so output is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Tuning Range Validation
// ============================================================================

/// Check combinations that are legal but almost certainly mistakes.
///
/// Returns (errors, warnings). Errors are values that would make the engine
/// misbehave; warnings are suspicious but allowed.
pub fn validate_tuning_ranges(
    config: &super::EngineConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let s = &config.session;

    // Recovery should be at least as sticky as worsening, otherwise alerts flicker off
    if s.debounce_recovering_frames < s.debounce_worsening_frames {
        warnings.push(ValidationWarning {
            field: "session.debounce_recovering_frames".to_string(),
            message: format!(
                "debounce_recovering_frames ({}) is below debounce_worsening_frames ({}); recovery will be faster than escalation",
                s.debounce_recovering_frames, s.debounce_worsening_frames
            ),
            suggestion: None,
        });
    }

    // A cooldown shorter than the window lets the controller decide on stale frames
    let window_secs = s.difficulty_window_frames as f64 / super::defaults::NOMINAL_FRAME_RATE_HZ;
    if s.cooldown_seconds < window_secs / 10.0 && s.difficulty_window_frames > 1 {
        warnings.push(ValidationWarning {
            field: "session.cooldown_seconds".to_string(),
            message: format!(
                "cooldown_seconds ({:.1}) is very short for a {}-frame difficulty window",
                s.cooldown_seconds, s.difficulty_window_frames
            ),
            suggestion: None,
        });
    }

    // Extrapolating for more than a second of video is guessing
    let k = config.preprocessing.max_extrapolation_frames;
    if f64::from(k) > super::defaults::NOMINAL_FRAME_RATE_HZ {
        warnings.push(ValidationWarning {
            field: "preprocessing.max_extrapolation_frames".to_string(),
            message: format!("max_extrapolation_frames = {k} exceeds one second of capture"),
            suggestion: None,
        });
    }

    // Budget beyond 1 s cannot be a real-time budget
    if config.runtime.frame_budget_ms > 1000 {
        errors.push(format!(
            "runtime.frame_budget_ms = {} exceeds 1000 ms",
            config.runtime.frame_budget_ms
        ));
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
