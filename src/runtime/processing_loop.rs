//! Source-to-session ingestion loop
//!
//! Pulls frames from any [`FrameSource`] and submits them to one running
//! session until the source ends, fails, or the cancellation token fires.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::queue::PushOutcome;
use super::session_task::SessionHandle;
use super::source::{FrameEvent, FrameSource};

/// How frames are handed to the session queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Never wait; evict the oldest queued frame when the session lags
    #[default]
    Live,
    /// Wait for queue space; every frame is processed (file replay)
    Lossless,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_read: u64,
    pub frames_submitted: u64,
    pub frames_evicted: u64,
    pub source_ended: bool,
}

impl std::fmt::Display for LoopStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ingestion: {} read, {} submitted, {} evicted{}",
            self.frames_read,
            self.frames_submitted,
            self.frames_evicted,
            if self.source_ended { "" } else { " (interrupted)" }
        )
    }
}

pub struct ProcessingLoop<'a> {
    handle: &'a SessionHandle,
    mode: IngestMode,
    cancel_token: CancellationToken,
}

impl<'a> ProcessingLoop<'a> {
    pub fn new(handle: &'a SessionHandle, mode: IngestMode, cancel_token: CancellationToken) -> Self {
        Self {
            handle,
            mode,
            cancel_token,
        }
    }

    /// Run until the source is exhausted or cancelled.
    ///
    /// In lossless mode the session is drained before returning, so a
    /// snapshot taken afterwards reflects every frame read.
    pub async fn run<S: FrameSource>(self, source: &mut S) -> LoopStats {
        let mut stats = LoopStats::default();
        info!(
            session = %self.handle.id(),
            source = source.source_name(),
            mode = ?self.mode,
            "Processing landmark frames"
        );

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = source.next_frame() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!(error = %e, "Frame source error");
                        break;
                    }
                },
            };

            let frame = match event {
                FrameEvent::Frame(frame) => frame,
                FrameEvent::Eof => {
                    info!(frames = stats.frames_read, "Frame source reached end");
                    stats.source_ended = true;
                    break;
                }
            };
            stats.frames_read += 1;

            let submitted = match self.mode {
                IngestMode::Live => self.handle.submit(frame),
                IngestMode::Lossless => self.handle.submit_lossless(frame).await,
            };
            match submitted {
                Ok(PushOutcome::DroppedOldest(_)) => {
                    stats.frames_submitted += 1;
                    stats.frames_evicted += 1;
                }
                Ok(_) => stats.frames_submitted += 1,
                Err(e) => {
                    warn!(error = %e, "Session no longer accepts frames");
                    break;
                }
            }
        }

        if self.mode == IngestMode::Lossless && stats.source_ended {
            if let Err(e) = self.handle.drain().await {
                warn!(error = %e, "Session closed before drain completed");
            }
        }
        info!("{}", stats);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::testing::{knee_frame, test_library};
    use crate::engine::PoseSession;
    use crate::pose::PractitionerProfile;
    use crate::runtime::session_task::spawn_session;
    use crate::runtime::source::{Pacing, ReplaySource};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn handle() -> SessionHandle {
        let session = PoseSession::start(
            Arc::new(test_library()),
            "knee_hold",
            PractitionerProfile::default(),
            Arc::new(EngineConfig::default()),
        )
        .expect("session starts");
        let (tx, _rx) = mpsc::unbounded_channel();
        spawn_session(session, tx)
    }

    #[tokio::test]
    async fn lossless_replay_processes_every_frame() {
        let handle = handle();
        let frames = (1..=40).map(|s| knee_frame(s, s * 33, 178.0, 0.9)).collect();
        let mut source = ReplaySource::new(frames, Pacing::None);
        let stats = ProcessingLoop::new(&handle, IngestMode::Lossless, CancellationToken::new())
            .run(&mut source)
            .await;
        assert!(stats.source_ended);
        assert_eq!(stats.frames_read, 40);
        assert_eq!(stats.frames_evicted, 0);

        let summary = handle.shutdown().await.expect("joined");
        assert_eq!(summary.diagnostics.frames_processed, 40);
    }

    #[tokio::test]
    async fn cancelled_loop_stops_reading() {
        let handle = handle();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let frames = (1..=5).map(|s| knee_frame(s, s * 33, 178.0, 0.9)).collect();
        let mut source = ReplaySource::new(frames, Pacing::None);
        let stats = ProcessingLoop::new(&handle, IngestMode::Live, cancel)
            .run(&mut source)
            .await;
        assert!(!stats.source_ended);
        assert_eq!(stats.frames_read, 0);
        handle.shutdown().await.expect("joined");
    }
}
