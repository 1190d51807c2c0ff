//! Landmark Stream Simulation
//!
//! Generates synthetic landmark frames for a standing practitioner, for
//! exercising poseguard without a camera. Scenarios:
//! - steady: good posture with detector jitter
//! - drift: torso gradually leans forward past the safe range
//! - occlusion: the left leg periodically drops out of view
//! - jerk: a sudden fast arm swing mid-session
//!
//! # Usage
//! ```bash
//! ./simulation --scenario drift --seconds 20 | ./poseguard run --pose pranamasana
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::Duration;

use poseguard::types::{Landmark, LandmarkFrame, LandmarkId, Point3};

// ============================================================================
// Body Constants (normalized image units, y grows downward)
// ============================================================================

const HIP_CENTER: (f64, f64) = (0.5, 0.55);
const HALF_HIP_WIDTH: f64 = 0.06;
const HALF_SHOULDER_WIDTH: f64 = 0.09;
const TORSO_LENGTH: f64 = 0.25;
const HEAD_OFFSET: f64 = 0.1;
const UPPER_ARM: f64 = 0.13;
const FOREARM: f64 = 0.12;
const THIGH: f64 = 0.2;
const SHIN: f64 = 0.2;
const FOOT: f64 = 0.05;

/// Detector position noise (normalized units)
const POSITION_JITTER: f64 = 0.002;
const BASE_CONFIDENCE: f64 = 0.93;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Steady,
    Drift,
    Occlusion,
    Jerk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Landmarks keyed by name
    Named,
    /// 33-entry MediaPipe arrays
    Mediapipe,
}

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Synthetic landmark streams for poseguard testing")]
#[command(version)]
struct Args {
    #[arg(long, value_enum, default_value = "steady")]
    scenario: Scenario,

    /// Session length in seconds
    #[arg(long, default_value = "10")]
    seconds: u32,

    /// Frame rate
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=120))]
    fps: u32,

    /// Output wire format
    #[arg(long, value_enum, default_value = "named")]
    format: Format,

    /// Emit frames in real time instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Posture Model
// ============================================================================

/// Joint configuration for one frame.
#[derive(Debug, Clone, Copy)]
struct Posture {
    /// Torso lean from vertical, degrees (positive = forward, +x)
    torso_lean_deg: f64,
    knee_deg: f64,
    elbow_deg: f64,
    /// Extra displacement of the left wrist (for jerk)
    wrist_offset: (f64, f64),
    /// Left leg not visible
    left_leg_occluded: bool,
}

impl Posture {
    const fn upright() -> Self {
        Self {
            torso_lean_deg: 2.0,
            knee_deg: 178.0,
            elbow_deg: 175.0,
            wrist_offset: (0.0, 0.0),
            left_leg_occluded: false,
        }
    }
}

fn scenario_posture(scenario: Scenario, t: f64, duration: f64) -> Posture {
    let mut p = Posture::upright();
    match scenario {
        Scenario::Steady => {}
        Scenario::Drift => {
            // Holds for the first fifth, then leans to 25° by the end
            let progress = ((t / duration - 0.2) / 0.8).clamp(0.0, 1.0);
            p.torso_lean_deg = 2.0 + 23.0 * progress;
        }
        Scenario::Occlusion => {
            // 0.5 s out of view every 3 s
            p.left_leg_occluded = t % 3.0 >= 2.5;
        }
        Scenario::Jerk => {
            let mid = duration / 2.0;
            if (mid..mid + 0.1).contains(&t) {
                p.wrist_offset = (0.25 * (t - mid) / 0.1, -0.2 * (t - mid) / 0.1);
            }
        }
    }
    p
}

/// Point at `length` from `origin` in direction `angle_deg` from straight down.
fn limb(origin: Point3, length: f64, angle_deg: f64) -> Point3 {
    let a = angle_deg.to_radians();
    origin.add(Point3::new(length * a.sin(), length * a.cos(), 0.0))
}

fn skeleton(p: &Posture) -> Vec<(LandmarkId, Point3)> {
    use LandmarkId::*;

    let hip = Point3::new(HIP_CENTER.0, HIP_CENTER.1, 0.0);
    let lean = p.torso_lean_deg.to_radians();
    let up = Point3::new(lean.sin(), -lean.cos(), 0.0);
    let shoulder = hip.add(up.scale(TORSO_LENGTH));
    let nose = shoulder.add(up.scale(HEAD_OFFSET));

    let mut points = vec![
        (Nose, nose),
        (LeftEar, nose.add(Point3::new(0.03, 0.01, 0.0))),
        (RightEar, nose.add(Point3::new(-0.03, 0.01, 0.0))),
    ];

    for (side, sign) in [(0usize, 1.0), (1usize, -1.0)] {
        let [sh_id, el_id, wr_id, hp_id, kn_id, an_id, he_id, ft_id] = if side == 0 {
            [LeftShoulder, LeftElbow, LeftWrist, LeftHip, LeftKnee, LeftAnkle, LeftHeel, LeftFootIndex]
        } else {
            [RightShoulder, RightElbow, RightWrist, RightHip, RightKnee, RightAnkle, RightHeel, RightFootIndex]
        };
        let s = shoulder.add(Point3::new(sign * HALF_SHOULDER_WIDTH, 0.0, 0.0));
        let e = limb(s, UPPER_ARM, 0.0);
        let mut w = limb(e, FOREARM, 180.0 - p.elbow_deg);
        if side == 0 {
            w = w.add(Point3::new(p.wrist_offset.0, p.wrist_offset.1, 0.0));
        }
        let h = hip.add(Point3::new(sign * HALF_HIP_WIDTH, 0.0, 0.0));
        let k = limb(h, THIGH, 0.0);
        let a = limb(k, SHIN, 180.0 - p.knee_deg);
        points.extend([
            (sh_id, s),
            (el_id, e),
            (wr_id, w),
            (hp_id, h),
            (kn_id, k),
            (an_id, a),
            (he_id, a.add(Point3::new(-0.01, 0.02, 0.0))),
            (ft_id, a.add(Point3::new(FOOT, 0.02, 0.0))),
        ]);
    }
    points
}

// ============================================================================
// Frame Generation
// ============================================================================

struct Generator {
    rng: StdRng,
    jitter: Normal<f64>,
    confidence_noise: Normal<f64>,
}

impl Generator {
    fn new(seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            rng: match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            },
            jitter: Normal::new(0.0, POSITION_JITTER).context("invalid jitter")?,
            confidence_noise: Normal::new(0.0, 0.02).context("invalid confidence noise")?,
        })
    }

    fn frame(&mut self, sequence: u64, timestamp_ms: u64, posture: &Posture) -> LandmarkFrame {
        let occluded = [
            LandmarkId::LeftKnee,
            LandmarkId::LeftAnkle,
            LandmarkId::LeftHeel,
            LandmarkId::LeftFootIndex,
        ];
        let mut frame = LandmarkFrame::new(sequence, timestamp_ms);
        for (id, p) in skeleton(posture) {
            let confidence = if posture.left_leg_occluded && occluded.contains(&id) {
                0.1
            } else {
                (BASE_CONFIDENCE + self.confidence_noise.sample(&mut self.rng)).clamp(0.0, 1.0)
            };
            frame = frame.with_landmark(
                id,
                Landmark::new(
                    p.x + self.jitter.sample(&mut self.rng),
                    p.y + self.jitter.sample(&mut self.rng),
                    p.z,
                    confidence,
                ),
            );
        }
        frame
    }
}

fn to_wire(frame: &LandmarkFrame, format: Format) -> Result<String> {
    match format {
        Format::Named => serde_json::to_string(frame).context("serialize frame"),
        Format::Mediapipe => {
            let mut points = vec![[0.0_f64; 4]; 33];
            for (id, lm) in &frame.landmarks {
                points[id.mediapipe_index()] = [lm.x, lm.y, lm.z, lm.confidence];
            }
            serde_json::to_string(&serde_json::json!({
                "sequence": frame.sequence,
                "timestamp_ms": frame.timestamp_ms,
                "landmarks": points,
            }))
            .context("serialize frame")
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut generator = Generator::new(args.seed)?;
    let total = u64::from(args.seconds) * u64::from(args.fps);
    let frame_ms = 1000.0 / f64::from(args.fps);
    let duration = f64::from(args.seconds);

    eprintln!(
        "simulation: {:?}, {} frames at {} fps{}",
        args.scenario,
        total,
        args.fps,
        args.seed.map(|s| format!(", seed {s}")).unwrap_or_default()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for i in 0..total {
        let t = i as f64 * frame_ms / 1000.0;
        let posture = scenario_posture(args.scenario, t, duration);
        let frame = generator.frame(i + 1, (i as f64 * frame_ms).round() as u64, &posture);
        writeln!(out, "{}", to_wire(&frame, args.format)?)?;
        if args.realtime {
            out.flush()?;
            std::thread::sleep(Duration::from_secs_f64(frame_ms / 1000.0));
        }
    }
    out.flush()?;
    Ok(())
}
