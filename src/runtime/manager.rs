//! Registry of concurrently running sessions
//!
//! Every session runs in its own task with its own state; the manager only
//! routes frames and requests by `SessionId` and fans all events into one
//! channel. Configuration is captured per session at start, so replacing it
//! here affects only sessions started afterwards.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::queue::PushOutcome;
use super::session_task::{spawn_session, SessionEvent, SessionHandle, SessionSummary};
use crate::config::EngineConfig;
use crate::engine::{PoseSession, RuleStatusSnapshot};
use crate::error::{EngineError, Result};
use crate::pose::{PoseLibrary, PractitionerProfile};
use crate::types::{LandmarkFrame, SessionId};

pub struct SessionManager {
    library: Arc<PoseLibrary>,
    config: Arc<EngineConfig>,
    sessions: HashMap<SessionId, SessionHandle>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionManager {
    /// Returns the manager and the receiver for events from all its sessions.
    pub fn new(
        library: Arc<PoseLibrary>,
        config: Arc<EngineConfig>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                library,
                config,
                sessions: HashMap::new(),
                events,
            },
            rx,
        )
    }

    pub fn library(&self) -> &Arc<PoseLibrary> {
        &self.library
    }

    /// Replace the configuration used for sessions started from now on.
    pub fn set_config(&mut self, config: Arc<EngineConfig>) {
        self.config = config;
    }

    /// Start a session. Must be called from within a tokio runtime.
    pub fn start(&mut self, pose_id: &str, profile: PractitionerProfile) -> Result<SessionId> {
        let session = PoseSession::start(
            Arc::clone(&self.library),
            pose_id,
            profile,
            Arc::clone(&self.config),
        )?;
        let handle = spawn_session(session, self.events.clone());
        let id = handle.id();
        self.sessions.insert(id, handle);
        info!(session = %id, active = self.sessions.len(), "Session registered");
        Ok(id)
    }

    pub fn handle(&self, id: SessionId) -> Result<&SessionHandle> {
        self.sessions.get(&id).ok_or(EngineError::SessionNotFound(id))
    }

    pub fn submit(&self, id: SessionId, frame: LandmarkFrame) -> Result<PushOutcome> {
        self.handle(id)?.submit(frame)
    }

    pub async fn snapshot(&self, id: SessionId) -> Result<RuleStatusSnapshot> {
        self.handle(id)?.snapshot().await
    }

    pub async fn switch_pose(&self, id: SessionId, pose_id: &str) -> Result<()> {
        self.handle(id)?.switch_pose(pose_id).await
    }

    /// End one session; later calls with the same id fail with `SessionNotFound`.
    pub async fn end(&mut self, id: SessionId) -> Result<SessionSummary> {
        let handle = self
            .sessions
            .remove(&id)
            .ok_or(EngineError::SessionNotFound(id))?;
        handle.shutdown().await
    }

    /// End every session concurrently.
    pub async fn shutdown_all(&mut self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = self.sessions.drain().map(|(_, h)| h).collect();
        let count = handles.len();
        let results = join_all(handles.into_iter().map(SessionHandle::shutdown)).await;
        let summaries: Vec<SessionSummary> = results
            .into_iter()
            .filter_map(|r| match r {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(error = %e, "Session did not shut down cleanly");
                    None
                }
            })
            .collect();
        info!(ended = summaries.len(), requested = count, "All sessions shut down");
        summaries
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{knee_frame, test_library};
    use crate::types::{EngineEvent, RuleStatus};

    fn manager() -> (SessionManager, mpsc::UnboundedReceiver<SessionEvent>) {
        SessionManager::new(Arc::new(test_library()), Arc::new(EngineConfig::default()))
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let (mut mgr, mut rx) = manager();
        let good = mgr.start("knee_hold", PractitionerProfile::default()).expect("starts");
        let bad = mgr.start("knee_hold", PractitionerProfile::default()).expect("starts");

        for seq in 1..=6 {
            mgr.handle(good)
                .expect("registered")
                .submit_lossless(knee_frame(seq, seq * 100, 178.0, 0.9))
                .await
                .expect("open");
            mgr.handle(bad)
                .expect("registered")
                .submit_lossless(knee_frame(seq, seq * 100, 140.0, 0.9))
                .await
                .expect("open");
        }
        mgr.handle(good).expect("registered").drain().await.expect("drained");
        mgr.handle(bad).expect("registered").drain().await.expect("drained");

        assert_eq!(mgr.snapshot(good).await.expect("snap").status("knee"), Some(RuleStatus::Ok));
        assert_eq!(mgr.snapshot(bad).await.expect("snap").status("knee"), Some(RuleStatus::Critical));

        let summaries = mgr.shutdown_all().await;
        assert_eq!(summaries.len(), 2);
        assert!(mgr.is_empty());

        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev.session_id, bad, "only the failing session corrects");
            assert!(matches!(ev.event, EngineEvent::Correction(_)));
        }
    }

    #[tokio::test]
    async fn ended_session_is_not_found() {
        let (mut mgr, _rx) = manager();
        let id = mgr.start("knee_hold", PractitionerProfile::default()).expect("starts");
        mgr.end(id).await.expect("ends");
        assert!(matches!(mgr.end(id).await, Err(EngineError::SessionNotFound(_))));
        assert!(matches!(
            mgr.submit(id, knee_frame(1, 0, 178.0, 0.9)),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn undefined_pose_is_rejected_at_start() {
        let (mut mgr, _rx) = manager();
        assert!(matches!(
            mgr.start("tadasana", PractitionerProfile::default()),
            Err(EngineError::PoseUndefined(_))
        ));
        assert!(mgr.is_empty());
    }

    #[tokio::test]
    async fn config_change_applies_to_new_sessions_only() {
        let (mut mgr, _rx) = manager();
        let first = mgr.start("knee_hold", PractitionerProfile::default()).expect("starts");
        let mut config = EngineConfig::default();
        config.session.debounce_worsening_frames = 1;
        mgr.set_config(Arc::new(config));
        let second = mgr.start("knee_hold", PractitionerProfile::default()).expect("starts");

        for id in [first, second] {
            let h = mgr.handle(id).expect("registered");
            h.submit_lossless(knee_frame(1, 0, 140.0, 0.9)).await.expect("open");
            h.drain().await.expect("drained");
        }
        assert_eq!(mgr.snapshot(first).await.expect("snap").status("knee"), Some(RuleStatus::Unknown));
        assert_eq!(mgr.snapshot(second).await.expect("snap").status("knee"), Some(RuleStatus::Critical));
        mgr.shutdown_all().await;
    }
}
