//! Scenario Regression Tests
//!
//! End-to-end behaviour of a `PoseSession` over synthetic knee streams:
//! debounce asymmetry, flicker suppression, unknown propagation, rate
//! limiting, difficulty decisions and determinism.

mod common;

use common::*;
use poseguard::engine::PoseSession;
use poseguard::pose::{ExperienceLevel, PoseLibrary};
use poseguard::types::{DifficultyDecision, EngineEvent, RuleStatus};
use poseguard::{EngineConfig, PractitionerProfile};
use std::sync::Arc;

fn knee_status(session: &PoseSession) -> RuleStatus {
    session.snapshot().status("knee").expect("knee rule present")
}

fn feed(session: &mut PoseSession, seqs: std::ops::RangeInclusive<u64>, angle: f64) -> Vec<EngineEvent> {
    seqs.flat_map(|seq| {
        session
            .process(&knee_frame(seq, angle, 0.9))
            .expect("in order")
            .events
    })
    .collect()
}

// ============================================================================
// Debounce
// ============================================================================

#[test]
fn scenario_a_critical_confirmed_on_third_frame_then_slow_recovery() {
    let mut session = start("knee_hold", unsmoothed_config());

    let r1 = session.process(&knee_frame(1, CRITICAL_ANGLE, 0.9)).expect("in order");
    assert_eq!(r1.evaluation.rules[0].status, RuleStatus::Critical, "raw status is immediate");
    assert_eq!(knee_status(&session), RuleStatus::Unknown);
    session.process(&knee_frame(2, CRITICAL_ANGLE, 0.9));
    assert_eq!(knee_status(&session), RuleStatus::Unknown);
    let r3 = session.process(&knee_frame(3, CRITICAL_ANGLE, 0.9)).expect("in order");
    assert_eq!(knee_status(&session), RuleStatus::Critical);
    assert_eq!(corrections(&r3.events), 1, "correction on the confirming frame");

    for seq in 4..=10 {
        session.process(&knee_frame(seq, OK_ANGLE, 0.9));
        assert_eq!(knee_status(&session), RuleStatus::Critical, "still critical at frame {seq}");
    }
    session.process(&knee_frame(11, OK_ANGLE, 0.9));
    assert_eq!(knee_status(&session), RuleStatus::Ok, "eight Ok frames recover");
}

#[test]
fn alternating_input_does_not_flicker() {
    let mut session = start("knee_hold", unsmoothed_config());
    feed(&mut session, 1..=5, OK_ANGLE);
    assert_eq!(knee_status(&session), RuleStatus::Ok);

    let mut events = Vec::new();
    for seq in 6..=45 {
        let angle = if seq % 2 == 0 { CRITICAL_ANGLE } else { OK_ANGLE };
        events.extend(session.process(&knee_frame(seq, angle, 0.9)).expect("in order").events);
        assert_eq!(knee_status(&session), RuleStatus::Ok);
    }
    assert_eq!(corrections(&events), 0);
}

#[test]
fn interrupted_recovery_starts_over() {
    let mut session = start("knee_hold", unsmoothed_config());
    feed(&mut session, 1..=3, CRITICAL_ANGLE);
    assert_eq!(knee_status(&session), RuleStatus::Critical);

    feed(&mut session, 4..=10, OK_ANGLE);
    // A single frame at the confirmed status resets the recovery count
    feed(&mut session, 11..=11, CRITICAL_ANGLE);
    feed(&mut session, 12..=18, OK_ANGLE);
    assert_eq!(knee_status(&session), RuleStatus::Critical);
    feed(&mut session, 19..=19, OK_ANGLE);
    assert_eq!(knee_status(&session), RuleStatus::Ok);

    // Worsening needs only three
    feed(&mut session, 20..=21, CRITICAL_ANGLE);
    assert_eq!(knee_status(&session), RuleStatus::Ok);
    feed(&mut session, 22..=22, CRITICAL_ANGLE);
    assert_eq!(knee_status(&session), RuleStatus::Critical);
}

// ============================================================================
// Preprocessing gaps
// ============================================================================

#[test]
fn scenario_c_short_gap_bridged_long_gap_unknown() {
    let mut session = start("knee_hold", EngineConfig::default());
    feed(&mut session, 1..=5, OK_ANGLE);

    for seq in 6..=10 {
        let report = session.process(&knee_frame(seq, OK_ANGLE, 0.1)).expect("in order");
        let knee = &report.evaluation.rules[0];
        assert_eq!(knee.status, RuleStatus::Ok, "frame {seq} is extrapolated");
        assert!((knee.value.expect("extrapolated value") - OK_ANGLE).abs() < 0.5);
    }
    assert_eq!(session.diagnostics().landmarks_extrapolated, 5);

    let report = session.process(&knee_frame(11, OK_ANGLE, 0.1)).expect("in order");
    assert_eq!(report.evaluation.rules[0].status, RuleStatus::Unknown);
    assert_eq!(report.evaluation.rules[0].value, None);
    assert_eq!(report.evaluation.coverage, 0.0);
    assert_eq!(knee_status(&session), RuleStatus::Ok, "confirmed status survives Unknown");

    // Confident again: measured immediately
    let report = session.process(&knee_frame(12, OK_ANGLE, 0.9)).expect("in order");
    assert_eq!(report.evaluation.rules[0].status, RuleStatus::Ok);
}

#[test]
fn unknown_frames_hold_status_and_suppress_corrections() {
    let mut session = start("knee_hold", unsmoothed_config());
    let events = feed(&mut session, 1..=3, CRITICAL_ANGLE);
    assert_eq!(corrections(&events), 1);

    let mut later = Vec::new();
    for seq in 4..=40 {
        later.extend(session.process(&knee_frame(seq, CRITICAL_ANGLE, 0.1)).expect("in order").events);
    }
    assert_eq!(knee_status(&session), RuleStatus::Critical);
    assert_eq!(corrections(&later), 0, "no corrections without coverage");

    let d = session.diagnostics();
    assert_eq!(d.corrections_emitted, 1);
    assert!(d.corrections_low_coverage > 0);
    assert!(d.rules_unknown >= 32);
}

// ============================================================================
// Corrections
// ============================================================================

#[test]
fn persistent_violation_is_rate_limited_per_region() {
    let mut session = start("knee_hold", unsmoothed_config());
    let events = feed(&mut session, 1..=50, CRITICAL_ANGLE);

    let emitted: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Correction(c) => Some(c.sequence),
            _ => None,
        })
        .collect();
    // 2 s window at 100 ms per frame
    assert_eq!(emitted, vec![3, 23, 43]);
    assert!(session.diagnostics().corrections_rate_limited > 0);
}

#[test]
fn correction_points_back_toward_the_ideal_range() {
    let mut session = start("knee_hold", unsmoothed_config());
    let events = feed(&mut session, 1..=3, CRITICAL_ANGLE);
    let Some(EngineEvent::Correction(c)) = events.first() else {
        panic!("expected a correction, got {events:?}");
    };
    assert_eq!(c.rule_id, "knee");
    assert_eq!(c.direction, poseguard::types::Direction::Increase);
    assert_eq!(c.severity, poseguard::types::Severity::Critical);
    assert!(c.target.min > CRITICAL_ANGLE);
}

// ============================================================================
// Difficulty
// ============================================================================

fn difficulty_events(events: &[EngineEvent]) -> Vec<(u64, DifficultyDecision)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Difficulty(d) => Some((d.sequence, d.decision)),
            _ => None,
        })
        .collect()
}

#[test]
fn scenario_b_one_simplify_per_window_and_cooldown() {
    let mut config = unsmoothed_config();
    config.session.apply_variant_changes = false;
    let mut session = start("knee_hold", config);

    let events = feed(&mut session, 1..=299, CRITICAL_ANGLE);
    assert_eq!(difficulty_events(&events), vec![(150, DifficultyDecision::Simplify)]);

    // Window refilled and cooldown (10 s) over
    let events = feed(&mut session, 300..=300, CRITICAL_ANGLE);
    assert_eq!(difficulty_events(&events), vec![(300, DifficultyDecision::Simplify)]);
}

#[test]
fn simplify_switches_to_easier_variant() {
    let mut session = start("knee_hold", unsmoothed_config());
    let events = feed(&mut session, 1..=150, CRITICAL_ANGLE);
    let Some(EngineEvent::Difficulty(d)) = events.last() else {
        panic!("expected a difficulty event last");
    };
    assert_eq!((d.from_pose.as_str(), d.to_pose.as_str()), ("knee_hold", "knee_bend"));
    assert_eq!(d.critical_fraction, 1.0);

    let snap = session.snapshot();
    assert_eq!(snap.pose_id, "knee_bend");
    assert_eq!(snap.status("knee"), Some(RuleStatus::Unknown), "trackers reset on switch");
}

#[test]
fn clean_window_advances_to_harder_variant() {
    let mut session = start("knee_bend", unsmoothed_config());
    let events = feed(&mut session, 1..=150, 105.0);
    assert_eq!(difficulty_events(&events), vec![(150, DifficultyDecision::Advance)]);
    assert_eq!(session.pose().id, "knee_hold");
}

#[test]
fn contraindicated_variant_is_never_suggested() {
    let mut library = knee_library().iter().cloned().collect::<Vec<_>>();
    for pose in &mut library {
        if pose.id == "knee_bend" {
            pose.contraindications = vec!["knee_injury".to_string()];
        }
    }
    let library = Arc::new(PoseLibrary::new(library).expect("valid"));
    let profile = PractitionerProfile::new(ExperienceLevel::Beginner, vec!["Knee_Injury".to_string()]);
    let mut session =
        PoseSession::start(library, "knee_hold", profile, Arc::new(unsmoothed_config())).expect("starts");

    let events = feed(&mut session, 1..=150, CRITICAL_ANGLE);
    assert!(difficulty_events(&events).is_empty());
    assert_eq!(session.diagnostics().difficulty_suppressed, 1);
    assert_eq!(session.pose().id, "knee_hold");
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn identical_input_gives_identical_output() {
    let frames: Vec<_> = (1..=400u64)
        .map(|seq| {
            let angle = 160.0 + 25.0 * (seq as f64 * 0.37).sin();
            let confidence = if seq % 17 < 3 { 0.2 } else { 0.9 };
            knee_frame(seq, angle, confidence)
        })
        .collect();

    let run = || {
        let mut session = start("knee_hold", EngineConfig::default());
        let events: Vec<EngineEvent> = frames
            .iter()
            .filter_map(|f| session.process(f))
            .flat_map(|r| r.events)
            .collect();
        let snap = session.snapshot();
        (events, snap.pose_id, snap.rules, snap.diagnostics.frames_processed)
    };

    let first = run();
    assert!(!first.0.is_empty(), "stream should produce events");
    assert_eq!(first, run());
}
