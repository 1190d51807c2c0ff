//! Pose session: drives the six stages for one practitioner
//!
//! A `PoseSession` owns every piece of cross-frame state (`SessionState`) and
//! processes frames strictly in sequence order on a single thread. Sessions
//! share nothing mutable; configuration and the pose library are read-only
//! `Arc`s fixed at start.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::corrections::CorrectionGenerator;
use super::debounce::{DebounceThresholds, RuleDebounce};
use super::difficulty::{
    ControllerState, DifficultyController, DifficultyOutcome, VariantAvailability, WindowSample,
};
use super::evaluator::{evaluate, FrameEvaluation};
use super::features::{extract_features, FeatureVector};
use super::preprocess::{preprocess, LandmarkQuality, SmoothingState};
use super::session_metrics::{MetricsReport, SessionMetrics};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::pose::{PoseDefinition, PoseLibrary, PractitionerProfile};
use crate::types::{
    BodyRegion, Diagnostics, DifficultyDecision, DifficultyEvent, Direction, EngineEvent,
    LandmarkFrame, LandmarkId, MotionHazardEvent, RuleStatus, SessionId,
};

// ============================================================================
// Session State
// ============================================================================

/// All mutable cross-frame state of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub smoothing: SmoothingState,
    /// Aligned with the current pose's rules
    pub trackers: Vec<RuleDebounce>,
    pub corrections: CorrectionGenerator,
    pub difficulty: DifficultyController,
    pub previous_features: Option<FeatureVector>,
    pub last_sequence: Option<u64>,
    pub last_timestamp_ms: Option<u64>,
    pub motion_hazard_active: bool,
    pub metrics: SessionMetrics,
    pub diagnostics: Diagnostics,
}

impl SessionState {
    fn new(config: &EngineConfig, rule_count: usize) -> Self {
        Self {
            smoothing: SmoothingState::new(),
            trackers: vec![RuleDebounce::new(); rule_count],
            corrections: CorrectionGenerator::new(config),
            difficulty: DifficultyController::new(&config.session),
            previous_features: None,
            last_sequence: None,
            last_timestamp_ms: None,
            motion_hazard_active: false,
            metrics: SessionMetrics::new(),
            diagnostics: Diagnostics::default(),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of processing one accepted frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub sequence: u64,
    /// Pose the frame was evaluated against (before any variant switch)
    pub pose_id: String,
    pub evaluation: FrameEvaluation,
    pub events: Vec<EngineEvent>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub rule_id: String,
    pub region: BodyRegion,
    pub status: RuleStatus,
    pub direction: Option<Direction>,
}

/// Confirmed per-rule statuses plus session metrics, on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStatusSnapshot {
    pub session_id: SessionId,
    pub pose_id: String,
    pub tier: u8,
    pub last_sequence: Option<u64>,
    pub last_timestamp_ms: Option<u64>,
    pub rules: Vec<RuleSnapshot>,
    pub controller: ControllerState,
    pub metrics: MetricsReport,
    pub diagnostics: Diagnostics,
}

impl RuleStatusSnapshot {
    pub fn status(&self, rule_id: &str) -> Option<RuleStatus> {
        self.rules.iter().find(|r| r.rule_id == rule_id).map(|r| r.status)
    }
}

// ============================================================================
// Pose Session
// ============================================================================

pub struct PoseSession {
    id: SessionId,
    config: Arc<EngineConfig>,
    library: Arc<PoseLibrary>,
    profile: PractitionerProfile,
    /// Current pose, already adapted to the profile
    pose: PoseDefinition,
    tracked: BTreeSet<LandmarkId>,
    thresholds: DebounceThresholds,
    budget: Duration,
    state: SessionState,
}

impl PoseSession {
    /// Start a session on `pose_id`.
    ///
    /// Fails with `Config`, `PoseUndefined` or `PoseContraindicated` before
    /// any frame is processed.
    pub fn start(
        library: Arc<PoseLibrary>,
        pose_id: &str,
        profile: PractitionerProfile,
        config: Arc<EngineConfig>,
    ) -> Result<Self> {
        config.validate()?;
        let pose = profile.adapt(library.get(pose_id)?)?;
        let id = SessionId::new_v4();
        info!(
            session = %id,
            pose = %pose.id,
            tier = pose.tier,
            rules = pose.rules.len(),
            level = ?profile.level,
            "Session started"
        );
        Ok(Self {
            id,
            tracked: pose.landmarks(),
            thresholds: DebounceThresholds::from_config(&config.session),
            budget: Duration::from_millis(config.runtime.frame_budget_ms),
            state: SessionState::new(&config, pose.rules.len()),
            pose,
            config,
            library,
            profile,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn pose(&self) -> &PoseDefinition {
        &self.pose
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.state.diagnostics
    }

    /// Process one frame. Returns `None` if the frame was dropped as out of order.
    pub fn process(&mut self, frame: &LandmarkFrame) -> Option<FrameReport> {
        let start = Instant::now();
        self.state.diagnostics.frames_received += 1;

        if let Some(last) = self.state.last_sequence {
            if frame.sequence <= last {
                warn!(
                    session = %self.id,
                    sequence = frame.sequence,
                    last_sequence = last,
                    "Out-of-order frame dropped"
                );
                self.state.diagnostics.frames_out_of_order += 1;
                return None;
            }
        }

        // ====================================================================
        // Stage 1: Preprocess
        // ====================================================================
        let smoothed = preprocess(
            frame,
            &self.tracked,
            &mut self.state.smoothing,
            &self.config.preprocessing,
        );
        self.state.diagnostics.landmarks_extrapolated +=
            smoothed.count(LandmarkQuality::Extrapolated) as u64;
        self.state.diagnostics.landmarks_unusable += smoothed.count(LandmarkQuality::Unusable) as u64;

        // ====================================================================
        // Stages 2-3: Features and raw evaluation (pure)
        // ====================================================================
        let features = extract_features(
            &smoothed,
            &self.pose,
            self.state.previous_features.as_ref(),
            &self.config.features,
        );
        let evaluation = evaluate(&features, &self.pose);
        self.state.diagnostics.rules_unknown += evaluation.count(RuleStatus::Unknown) as u64;
        self.state.metrics.record(&evaluation);

        let mut events = Vec::new();

        // Motion hazard rising edge
        if features.motion_hazard && !self.state.motion_hazard_active {
            let fastest = features.fastest_landmark();
            let event = MotionHazardEvent {
                timestamp_ms: frame.timestamp_ms,
                sequence: frame.sequence,
                fastest_landmark: fastest.map(|(id, _)| id),
                max_landmark_speed: fastest.map_or(0.0, |(_, s)| s),
                max_angular_speed: features.max_angular_speed(),
            };
            info!(
                session = %self.id,
                sequence = frame.sequence,
                speed = event.max_landmark_speed,
                angular_speed = event.max_angular_speed,
                "Motion hazard"
            );
            self.state.diagnostics.motion_hazards += 1;
            events.push(EngineEvent::MotionHazard(event));
        }
        self.state.motion_hazard_active = features.motion_hazard;

        // ====================================================================
        // Stage 4: Debounce
        // ====================================================================
        for ((tracker, rule), raw) in self
            .state
            .trackers
            .iter_mut()
            .zip(&self.pose.rules)
            .zip(&evaluation.rules)
        {
            if let Some(t) = tracker.update(raw.status, raw.direction, &self.thresholds) {
                debug!(
                    session = %self.id,
                    rule = %rule.id,
                    from = %t.from,
                    to = %t.to,
                    sequence = frame.sequence,
                    "Rule status confirmed"
                );
            }
        }

        // ====================================================================
        // Stage 5: Corrections
        // ====================================================================
        let outcome = self
            .state
            .corrections
            .generate(&self.pose, &self.state.trackers, &evaluation);
        self.state.diagnostics.corrections_rate_limited += outcome.rate_limited;
        self.state.diagnostics.corrections_low_coverage += outcome.low_coverage;
        for correction in outcome.events {
            info!(
                session = %self.id,
                rule = %correction.rule_id,
                region = %correction.region,
                severity = ?correction.severity,
                direction = ?correction.direction,
                sequence = correction.sequence,
                "Correction"
            );
            self.state.diagnostics.corrections_emitted += 1;
            events.push(EngineEvent::Correction(correction));
        }

        // ====================================================================
        // Stage 6: Difficulty
        // ====================================================================
        let evaluated_pose = self.pose.id.clone();
        let sample = WindowSample {
            score: evaluation.score,
            has_critical: evaluation.has_critical,
            coverage: evaluation.coverage,
        };
        let variants = VariantAvailability {
            easier: self.variant_allowed(self.pose.easier.as_deref()),
            harder: self.variant_allowed(self.pose.harder.as_deref()),
        };
        match self.state.difficulty.observe(sample, frame.timestamp_ms, variants) {
            DifficultyOutcome::Hold => {}
            DifficultyOutcome::Suppressed(verdict) => {
                debug!(session = %self.id, decision = %verdict.decision, pose = %self.pose.id, "No variant available");
                self.state.diagnostics.difficulty_suppressed += 1;
            }
            DifficultyOutcome::Decided(verdict) => {
                let target = match verdict.decision {
                    DifficultyDecision::Simplify => self.pose.easier.clone(),
                    DifficultyDecision::Advance => self.pose.harder.clone(),
                    DifficultyDecision::Maintain => None,
                };
                if let Some(to_pose) = target {
                    info!(
                        session = %self.id,
                        decision = %verdict.decision,
                        from = %self.pose.id,
                        to = %to_pose,
                        critical_fraction = verdict.critical_fraction,
                        mean_score = verdict.mean_score,
                        "Difficulty decision"
                    );
                    self.state.diagnostics.difficulty_decisions += 1;
                    events.push(EngineEvent::Difficulty(DifficultyEvent {
                        decision: verdict.decision,
                        from_pose: self.pose.id.clone(),
                        to_pose: to_pose.clone(),
                        timestamp_ms: frame.timestamp_ms,
                        sequence: frame.sequence,
                        critical_fraction: verdict.critical_fraction,
                        min_coverage: verdict.min_coverage,
                    }));
                    if self.config.session.apply_variant_changes {
                        if let Err(e) = self.switch_pose(&to_pose) {
                            warn!(session = %self.id, error = %e, "Variant switch failed, staying on current pose");
                        }
                    }
                }
            }
        }

        self.state.previous_features = Some(features);
        self.state.last_sequence = Some(frame.sequence);
        self.state.last_timestamp_ms = Some(frame.timestamp_ms);
        self.state.diagnostics.frames_processed += 1;

        let elapsed = start.elapsed();
        if elapsed > self.budget {
            self.state.diagnostics.budget_exceeded += 1;
            debug!(
                session = %self.id,
                sequence = frame.sequence,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.config.runtime.frame_budget_ms,
                "Frame exceeded processing budget"
            );
        }

        Some(FrameReport {
            sequence: frame.sequence,
            pose_id: evaluated_pose,
            evaluation,
            events,
            elapsed,
        })
    }

    fn variant_allowed(&self, id: Option<&str>) -> bool {
        id.and_then(|id| self.library.get(id).ok())
            .is_some_and(|pose| self.profile.contraindication(pose).is_none())
    }

    /// Switch to another pose from the library, resetting per-rule trackers.
    ///
    /// Smoothing, rate-limit windows, the difficulty controller and metrics
    /// carry over: they describe the practitioner, not the rule set.
    pub fn switch_pose(&mut self, pose_id: &str) -> Result<()> {
        let pose = self.profile.adapt(self.library.get(pose_id)?)?;
        info!(session = %self.id, from = %self.pose.id, to = %pose.id, tier = pose.tier, "Pose switched");
        self.state.trackers = vec![RuleDebounce::new(); pose.rules.len()];
        self.tracked = pose.landmarks();
        self.pose = pose;
        Ok(())
    }

    pub fn snapshot(&self) -> RuleStatusSnapshot {
        RuleStatusSnapshot {
            session_id: self.id,
            pose_id: self.pose.id.clone(),
            tier: self.pose.tier,
            last_sequence: self.state.last_sequence,
            last_timestamp_ms: self.state.last_timestamp_ms,
            rules: self
                .pose
                .rules
                .iter()
                .zip(&self.state.trackers)
                .map(|(rule, t)| RuleSnapshot {
                    rule_id: rule.id.clone(),
                    region: rule.region,
                    status: t.confirmed(),
                    direction: t.confirmed().is_violation().then(|| t.last_direction()).flatten(),
                })
                .collect(),
            controller: self.state.difficulty.state(),
            metrics: self.state.metrics.report(),
            diagnostics: self.state.diagnostics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::engine::testing::{knee_frame, test_library};
    use crate::error::EngineError;
    use crate::pose::ExperienceLevel;

    fn start(pose: &str, config: EngineConfig) -> PoseSession {
        PoseSession::start(
            Arc::new(test_library()),
            pose,
            PractitionerProfile::default(),
            Arc::new(config),
        )
        .expect("session starts")
    }

    #[test]
    fn unknown_pose_fails_before_processing() {
        let result = PoseSession::start(
            Arc::new(test_library()),
            "tadasana",
            PractitionerProfile::default(),
            Arc::new(EngineConfig::default()),
        );
        assert!(matches!(result, Err(EngineError::PoseUndefined(_))));
    }

    #[test]
    fn contraindicated_pose_fails_to_start() {
        let library = Arc::new(PoseLibrary::builtin().expect("valid"));
        let profile = PractitionerProfile::new(ExperienceLevel::Beginner, vec!["high_bp".to_string()]);
        let result = PoseSession::start(library, "parvatasana", profile, Arc::new(EngineConfig::default()));
        assert!(matches!(result, Err(EngineError::PoseContraindicated { .. })));
    }

    #[test]
    fn invalid_config_is_rejected_at_start() {
        let mut config = EngineConfig::default();
        config.preprocessing.smoothing_factor = 0.0;
        let result = PoseSession::start(
            Arc::new(test_library()),
            "knee_hold",
            PractitionerProfile::default(),
            Arc::new(config),
        );
        match result {
            Err(EngineError::Config(ConfigError::Validation(errors))) => {
                assert!(errors.iter().any(|e| e.contains("smoothing_factor")), "got {errors:?}");
            }
            Err(other) => panic!("expected config validation error, got {other:?}"),
            Ok(_) => panic!("session started with an invalid config"),
        }
    }

    #[test]
    fn over_budget_frame_is_counted_and_still_processed() {
        let mut session = start("knee_hold", EngineConfig::default());
        session.budget = Duration::ZERO;
        let mut events = Vec::new();
        for seq in 1..=3 {
            let report = session.process(&knee_frame(seq, seq * 100, 140.0, 0.9)).expect("in order");
            assert!(report.elapsed > Duration::ZERO);
            events.extend(report.events);
        }
        let d = session.diagnostics();
        assert_eq!(d.budget_exceeded, 3);
        assert_eq!(d.frames_processed, 3);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Correction(_))));
        assert_eq!(session.snapshot().status("knee"), Some(RuleStatus::Critical));
    }

    #[test]
    fn out_of_order_frames_are_dropped_and_counted() {
        let mut session = start("knee_hold", EngineConfig::default());
        assert!(session.process(&knee_frame(5, 165, 175.0, 0.9)).is_some());
        assert!(session.process(&knee_frame(5, 198, 175.0, 0.9)).is_none());
        assert!(session.process(&knee_frame(4, 231, 175.0, 0.9)).is_none());
        assert!(session.process(&knee_frame(6, 264, 175.0, 0.9)).is_some());
        let d = session.diagnostics();
        assert_eq!(d.frames_out_of_order, 2);
        assert_eq!(d.frames_processed, 2);
        assert_eq!(d.frames_received, 4);
    }

    #[test]
    fn snapshot_reports_confirmed_status() {
        let mut session = start("knee_hold", EngineConfig::default());
        for seq in 1..=3 {
            session.process(&knee_frame(seq, seq * 33, 175.0, 0.9));
        }
        let snap = session.snapshot();
        assert_eq!(snap.status("knee"), Some(RuleStatus::Ok));
        assert_eq!(snap.last_sequence, Some(3));
        assert_eq!(snap.pose_id, "knee_hold");
    }

    #[test]
    fn variant_switch_resets_trackers() {
        let mut session = start("knee_hold", EngineConfig::default());
        for seq in 1..=3 {
            session.process(&knee_frame(seq, seq * 33, 175.0, 0.9));
        }
        session.switch_pose("knee_bend").expect("linked variant exists");
        let snap = session.snapshot();
        assert_eq!(snap.pose_id, "knee_bend");
        assert_eq!(snap.status("knee"), Some(RuleStatus::Unknown));
    }
}
