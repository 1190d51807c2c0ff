//! poseguard - real-time pose safety and correction engine
//!
//! Reads landmark frames (JSON lines) and writes engine events (JSON lines)
//! to stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Live: frames from the vision process on stdin
//! vision-capture | poseguard run --pose hasta_uttanasana --level intermediate
//!
//! # Replay a recorded or simulated session as fast as possible
//! simulation --scenario drift > frames.jsonl
//! poseguard run --pose ashwa_sanchalanasana --frames frames.jsonl --speed 0
//!
//! # Validate configuration and pose library
//! poseguard check --config poseguard.toml --poses poses.toml
//! ```
//!
//! # Environment Variables
//!
//! - `POSEGUARD_CONFIG`: engine config path (default: ./poseguard.toml)
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use poseguard::config::validation::validate_tuning_ranges;
use poseguard::runtime::{
    load_frames, IngestMode, Pacing, ProcessingLoop, ReplaySource, SessionManager, StdinSource,
};
use poseguard::{EngineConfig, ExperienceLevel, PoseLibrary, PractitionerProfile};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "poseguard")]
#[command(about = "Real-time pose safety and correction engine")]
#[command(version)]
struct CliArgs {
    /// Engine config TOML (default: $POSEGUARD_CONFIG, then ./poseguard.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pose library TOML (default: built-in catalog)
    #[arg(long, global = true)]
    poses: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Run one session over a frame stream (default)
    Run(RunArgs),

    /// Validate the engine config and pose library
    Check {
        /// Write the built-in default config to this path and exit
        #[arg(long, value_name = "PATH")]
        write_defaults: Option<PathBuf>,
    },

    /// List the poses in the library
    Poses {
        /// Print the library as TOML instead of a table
        #[arg(long)]
        toml: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pose to start on
    #[arg(long, default_value = "pranamasana")]
    pose: String,

    /// Practitioner experience level
    #[arg(long, default_value = "beginner")]
    level: ExperienceLevel,

    /// Declared health condition (repeatable)
    #[arg(long = "condition", value_name = "CONDITION")]
    conditions: Vec<String>,

    /// JSON-lines frame file (default: read stdin)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Replay speed for --frames (1 = realtime, 0 = as fast as possible, lossless)
    #[arg(long, default_value = "0")]
    speed: f64,

    /// Print the final rule-status snapshot to stderr
    #[arg(long)]
    snapshot: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            pose: "pranamasana".to_string(),
            level: ExperienceLevel::default(),
            conditions: Vec::new(),
            frames: None,
            speed: 0.0,
            snapshot: false,
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load_from_file(p)
            .with_context(|| format!("Invalid engine config {}", p.display())),
        None => Ok(EngineConfig::load()),
    }
}

fn load_library(path: Option<&Path>) -> Result<PoseLibrary> {
    match path {
        Some(p) => PoseLibrary::load_from_file(p)
            .with_context(|| format!("Invalid pose library {}", p.display())),
        None => PoseLibrary::builtin().context("Built-in pose catalog failed validation"),
    }
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run_session(
    args: RunArgs,
    library: Arc<PoseLibrary>,
    config: Arc<EngineConfig>,
    cancel: CancellationToken,
) -> Result<()> {
    let profile = PractitionerProfile::new(args.level, args.conditions);
    let (mut manager, mut events) = SessionManager::new(library, config);
    let id = manager
        .start(&args.pose, profile)
        .with_context(|| format!("Cannot start session on '{}'", args.pose))?;

    // Events go to stdout, one JSON object per line
    let writer = tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => {
                    println!("{line}");
                    written += 1;
                }
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            }
        }
        written
    });

    let handle = manager.handle(id)?;
    let stats = match args.frames {
        Some(path) => {
            let frames = load_frames(&path)?;
            let (pacing, mode) = if args.speed > 0.0 {
                (Pacing::Timestamps(args.speed), IngestMode::Live)
            } else {
                (Pacing::None, IngestMode::Lossless)
            };
            info!(frames = frames.len(), speed = args.speed, "Replaying frame file");
            let mut source = ReplaySource::new(frames, pacing);
            ProcessingLoop::new(handle, mode, cancel).run(&mut source).await
        }
        None => {
            info!("Reading frames from stdin");
            let mut source = StdinSource::new();
            ProcessingLoop::new(handle, IngestMode::Live, cancel).run(&mut source).await
        }
    };

    let snapshot = if args.snapshot {
        Some(manager.snapshot(id).await?)
    } else {
        None
    };

    let summaries = manager.shutdown_all().await;
    drop(manager);
    let written = writer.await.context("Event writer task failed")?;

    if let Some(snapshot) = snapshot {
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    for summary in &summaries {
        info!("{}", summary);
    }
    info!(events = written, "{}", stats);
    Ok(())
}

fn run_check(
    config_path: Option<&Path>,
    library_path: Option<&Path>,
    write_defaults: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = write_defaults {
        EngineConfig::default()
            .save_to_file(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = load_config(config_path)?;
    let (_, warnings) = validate_tuning_ranges(&config);
    for w in &warnings {
        println!("warning: {w}");
    }
    let library = load_library(library_path)?;
    println!(
        "OK: config valid ({} warning(s)), {} pose(s) in library",
        warnings.len(),
        library.len()
    );
    Ok(())
}

fn run_poses(library_path: Option<&Path>, as_toml: bool) -> Result<()> {
    let library = load_library(library_path)?;
    if as_toml {
        print!("{}", library.to_toml().context("Failed to serialize pose library")?);
        return Ok(());
    }
    println!("{:<24} {:>4}  {:<24} {:<24} {:>5}  contraindications", "pose", "tier", "easier", "harder", "rules");
    for pose in library.iter() {
        println!(
            "{:<24} {:>4}  {:<24} {:<24} {:>5}  {}",
            pose.id,
            pose.tier,
            pose.easier.as_deref().unwrap_or("-"),
            pose.harder.as_deref().unwrap_or("-"),
            pose.rules.len(),
            pose.contraindications.join(", ")
        );
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    match args.command.unwrap_or_else(|| SubCommand::Run(RunArgs::default())) {
        SubCommand::Check { write_defaults } => {
            run_check(args.config.as_deref(), args.poses.as_deref(), write_defaults)
        }
        SubCommand::Poses { toml } => run_poses(args.poses.as_deref(), toml),
        SubCommand::Run(run_args) => {
            let config = Arc::new(load_config(args.config.as_deref())?);
            let library = Arc::new(load_library(args.poses.as_deref())?);
            info!(
                poses = library.len(),
                queue_depth = config.runtime.queue_depth,
                budget_ms = config.runtime.frame_budget_ms,
                "poseguard starting"
            );

            // Graceful shutdown via Ctrl+C
            let cancel_token = CancellationToken::new();
            let shutdown_token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Received Ctrl+C, shutting down");
                shutdown_token.cancel();
            });

            run_session(run_args, library, config, cancel_token).await?;
            info!("poseguard shutdown complete");
            Ok(())
        }
    }
}
