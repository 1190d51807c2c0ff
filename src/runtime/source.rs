//! Landmark frame sources
//!
//! The vision collaborator delivers one JSON object per frame. Two shapes are
//! accepted on the wire:
//!
//! - named: `{"sequence":1,"timestamp_ms":33,"landmarks":{"left_knee":{"x":..,"y":..,"z":..,"confidence":..}}}`
//! - MediaPipe indexed: `{"sequence":1,"timestamp_ms":33,"landmarks":[[x,y,z,visibility], ...]}`
//!   where the array position is the 33-point MediaPipe index. Untracked
//!   indices are ignored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::types::{Landmark, LandmarkFrame, LandmarkId};

/// Events produced by a frame source.
pub enum FrameEvent {
    Frame(LandmarkFrame),
    /// No more frames will arrive
    Eof,
}

/// Where landmark frames come from.
///
/// The processing loop calls [`FrameSource::next_frame`] in a `select!` with
/// cancellation, so implementations may await freely.
#[async_trait]
pub trait FrameSource: Send + 'static {
    async fn next_frame(&mut self) -> Result<FrameEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Named(LandmarkFrame),
    Indexed {
        sequence: u64,
        timestamp_ms: u64,
        landmarks: Vec<[f64; 4]>,
    },
}

/// Parse one JSON line in either wire shape.
pub fn parse_frame_line(line: &str) -> Result<LandmarkFrame, serde_json::Error> {
    Ok(match serde_json::from_str::<WireFrame>(line)? {
        WireFrame::Named(frame) => frame,
        WireFrame::Indexed {
            sequence,
            timestamp_ms,
            landmarks,
        } => landmarks
            .iter()
            .enumerate()
            .filter_map(|(i, [x, y, z, c])| {
                LandmarkId::from_mediapipe_index(i).map(|id| (id, Landmark::new(*x, *y, *z, *c)))
            })
            .fold(LandmarkFrame::new(sequence, timestamp_ms), |frame, (id, lm)| {
                frame.with_landmark(id, lm)
            }),
    })
}

/// Load a JSON-lines frame file. Malformed lines are logged and skipped.
pub fn load_frames(path: &Path) -> Result<Vec<LandmarkFrame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read frame file {}", path.display()))?;
    let mut frames = Vec::new();
    let mut skipped = 0usize;
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_frame_line(trimmed) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                skipped += 1;
                warn!(line = lineno + 1, error = %e, "Skipping malformed frame");
            }
        }
    }
    info!(path = %path.display(), frames = frames.len(), skipped, "Frame file loaded");
    Ok(frames)
}

// ============================================================================
// Replay Source (file / simulation)
// ============================================================================

/// Inter-frame pacing for replays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// As fast as the consumer accepts
    None,
    /// Fixed delay between frames
    Fixed(u64),
    /// Follow capture timestamps, scaled by a speed factor (> 0)
    Timestamps(f64),
}

/// Replays pre-loaded frames.
pub struct ReplaySource {
    frames: std::vec::IntoIter<LandmarkFrame>,
    pacing: Pacing,
    last_timestamp_ms: Option<u64>,
}

impl ReplaySource {
    pub fn new(frames: Vec<LandmarkFrame>, pacing: Pacing) -> Self {
        Self {
            frames: frames.into_iter(),
            pacing,
            last_timestamp_ms: None,
        }
    }

    fn delay_before(&self, frame: &LandmarkFrame) -> Option<std::time::Duration> {
        // No delay before the first frame
        let last = self.last_timestamp_ms?;
        match self.pacing {
            Pacing::None => None,
            Pacing::Fixed(ms) => (ms > 0).then(|| std::time::Duration::from_millis(ms)),
            Pacing::Timestamps(speed) if speed > 0.0 => {
                let gap_ms = frame.timestamp_ms.saturating_sub(last) as f64 / speed;
                (gap_ms > 0.0).then(|| std::time::Duration::from_secs_f64(gap_ms / 1000.0))
            }
            Pacing::Timestamps(_) => None,
        }
    }
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn next_frame(&mut self) -> Result<FrameEvent> {
        let Some(frame) = self.frames.next() else {
            return Ok(FrameEvent::Eof);
        };
        if let Some(delay) = self.delay_before(&frame) {
            tokio::time::sleep(delay).await;
        }
        self.last_timestamp_ms = Some(frame.timestamp_ms);
        Ok(FrameEvent::Frame(frame))
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON lines)
// ============================================================================

/// Reads one JSON frame per line from stdin.
pub struct StdinSource {
    reader: BufReader<tokio::io::Stdin>,
    line_buf: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            line_buf: String::new(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for StdinSource {
    async fn next_frame(&mut self) -> Result<FrameEvent> {
        loop {
            self.line_buf.clear();
            let bytes = self
                .reader
                .read_line(&mut self.line_buf)
                .await
                .context("Failed to read stdin")?;
            if bytes == 0 {
                return Ok(FrameEvent::Eof);
            }
            let trimmed = self.line_buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_frame_line(trimmed) {
                Ok(frame) => return Ok(FrameEvent::Frame(frame)),
                Err(e) => {
                    warn!(error = %e, "Failed to parse frame from stdin, skipping");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_named_frame() {
        let line = r#"{"sequence":3,"timestamp_ms":99,"landmarks":{"left_knee":{"x":0.5,"y":0.5,"confidence":0.9}}}"#;
        let frame = parse_frame_line(line).expect("valid frame");
        assert_eq!(frame.sequence, 3);
        let knee = frame.get(LandmarkId::LeftKnee).expect("knee present");
        assert_eq!(knee.z, 0.0);
        assert_eq!(knee.confidence, 0.9);
    }

    #[test]
    fn parses_mediapipe_indexed_frame() {
        let mut points = vec![[0.0, 0.0, 0.0, 0.1]; 33];
        points[LandmarkId::LeftKnee.mediapipe_index()] = [0.4, 0.6, -0.1, 0.95];
        let line = serde_json::json!({"sequence": 1, "timestamp_ms": 33, "landmarks": points}).to_string();
        let frame = parse_frame_line(&line).expect("valid frame");
        assert_eq!(frame.landmarks.len(), LandmarkId::ALL.len());
        let knee = frame.get(LandmarkId::LeftKnee).expect("knee present");
        assert_eq!((knee.x, knee.y, knee.z, knee.confidence), (0.4, 0.6, -0.1, 0.95));
    }

    #[test]
    fn load_frames_skips_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"sequence":1,"timestamp_ms":0}}"#).expect("write");
        writeln!(file, "# comment").expect("write");
        writeln!(file, "not json").expect("write");
        writeln!(file).expect("write");
        writeln!(file, r#"{{"sequence":2,"timestamp_ms":33}}"#).expect("write");
        let frames = load_frames(file.path()).expect("readable");
        assert_eq!(frames.iter().map(|f| f.sequence).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn replay_yields_frames_then_eof() {
        let mut source = ReplaySource::new(
            vec![LandmarkFrame::new(1, 0), LandmarkFrame::new(2, 33)],
            Pacing::None,
        );
        assert!(matches!(source.next_frame().await, Ok(FrameEvent::Frame(f)) if f.sequence == 1));
        assert!(matches!(source.next_frame().await, Ok(FrameEvent::Frame(f)) if f.sequence == 2));
        assert!(matches!(source.next_frame().await, Ok(FrameEvent::Eof)));
    }

    #[tokio::test(start_paused = true)]
    async fn timestamp_pacing_follows_capture_gaps() {
        let mut source = ReplaySource::new(
            vec![LandmarkFrame::new(1, 0), LandmarkFrame::new(2, 1000)],
            Pacing::Timestamps(2.0),
        );
        let start = tokio::time::Instant::now();
        source.next_frame().await.expect("first");
        source.next_frame().await.expect("second");
        assert_eq!(start.elapsed(), std::time::Duration::from_millis(500));
    }
}
