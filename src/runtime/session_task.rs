//! One tokio task per pose session
//!
//! The task owns the `PoseSession` outright; nothing else touches its state.
//! Frames arrive through a drop-oldest `FrameQueue`, snapshot and pose-switch
//! requests through a small command channel, and events leave through an
//! `EventSink` that can be closed from outside.
//!
//! ## Teardown
//!
//! `SessionHandle::shutdown` closes the sink first (under its lock), then the
//! queue, then cancels the task and joins it. A frame already in flight when
//! shutdown starts may finish processing, but none of its events can be
//! delivered once `close` has returned. Dropping the handle without
//! `shutdown` also ends the task, which releases the event sender.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::queue::{FrameQueue, PushOutcome};
use crate::config::defaults::SESSION_COMMAND_CHANNEL_CAPACITY;
use crate::engine::{MetricsReport, PoseSession, RuleStatusSnapshot};
use crate::error::{EngineError, Result};
use crate::types::{Diagnostics, EngineEvent, LandmarkFrame, SessionId};

// ============================================================================
// Events and Summary
// ============================================================================

/// An engine event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub event: EngineEvent,
}

/// Final state of a session, returned when its task is joined.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    /// Pose active when the session ended
    pub pose_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Frames evicted from the ingestion queue before processing
    pub frames_evicted: u64,
    pub diagnostics: Diagnostics,
    pub metrics: MetricsReport,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session {} on {} ({:.1}s): {}, {} evicted",
            self.session_id,
            self.pose_id,
            (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            self.diagnostics,
            self.frames_evicted
        )
    }
}

// ============================================================================
// Event Sink
// ============================================================================

/// Closable event sender shared between the task and its handle.
#[derive(Debug)]
pub struct EventSink {
    tx: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Deliver an event. Returns false once the sink is closed or the receiver
    /// is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().is_some_and(|tx| tx.send(event).is_ok())
    }

    /// After this returns, `send` never delivers again.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

// ============================================================================
// Session Task
// ============================================================================

enum SessionCommand {
    Snapshot(oneshot::Sender<RuleStatusSnapshot>),
    SwitchPose {
        pose_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Replies once every frame queued before it has been processed
    Flush(oneshot::Sender<()>),
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(_) => f.write_str("Snapshot"),
            Self::SwitchPose { pose_id, .. } => write!(f, "SwitchPose({pose_id})"),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

enum Wake {
    Frame(LandmarkFrame),
    Command(SessionCommand),
    Stop,
}

struct SessionTask {
    session: PoseSession,
    queue: Arc<FrameQueue>,
    sink: Arc<EventSink>,
    commands: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

impl SessionTask {
    async fn run(self) -> SessionSummary {
        let Self {
            mut session,
            queue,
            sink,
            mut commands,
            cancel,
            started_at,
        } = self;
        let id = session.id();

        loop {
            // Frames before commands: a flush or snapshot observes every frame
            // queued ahead of it. A closed command channel means the handle
            // was dropped without shutdown.
            let wake = tokio::select! {
                biased;
                () = cancel.cancelled() => Wake::Stop,
                frame = queue.pop() => frame.map_or(Wake::Stop, Wake::Frame),
                command = commands.recv() => command.map_or(Wake::Stop, Wake::Command),
            };

            match wake {
                Wake::Stop => break,
                Wake::Frame(frame) => {
                    let Some(report) = session.process(&frame) else {
                        continue;
                    };
                    for event in report.events {
                        if !sink.send(SessionEvent { session_id: id, event }) {
                            debug!(session = %id, sequence = report.sequence, "Event sink closed, discarding events");
                            break;
                        }
                    }
                }
                Wake::Command(SessionCommand::Snapshot(reply)) => {
                    let _ = reply.send(session.snapshot());
                }
                Wake::Command(SessionCommand::SwitchPose { pose_id, reply }) => {
                    let _ = reply.send(session.switch_pose(&pose_id));
                }
                Wake::Command(SessionCommand::Flush(reply)) => {
                    let _ = reply.send(());
                }
            }
        }

        let summary = SessionSummary {
            session_id: id,
            pose_id: session.pose().id.clone(),
            started_at,
            ended_at: Utc::now(),
            frames_evicted: queue.dropped(),
            diagnostics: session.diagnostics().clone(),
            metrics: session.state().metrics.report(),
        };
        info!(session = %id, "{}", summary);
        summary
    }
}

// ============================================================================
// Session Handle
// ============================================================================

/// Owner-side handle to a running session task.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    queue: Arc<FrameQueue>,
    sink: Arc<EventSink>,
    commands: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    join: JoinHandle<SessionSummary>,
}

/// Spawn a task for `session`. Events go to `events`, tagged with the session id.
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(
    session: PoseSession,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> SessionHandle {
    let id = session.id();
    let queue = Arc::new(FrameQueue::new(session.config().runtime.queue_depth));
    let sink = Arc::new(EventSink::new(events));
    let cancel = CancellationToken::new();
    let (command_tx, command_rx) = mpsc::channel(SESSION_COMMAND_CHANNEL_CAPACITY);

    let task = SessionTask {
        session,
        queue: Arc::clone(&queue),
        sink: Arc::clone(&sink),
        commands: command_rx,
        cancel: cancel.clone(),
        started_at: Utc::now(),
    };
    let join = tokio::spawn(task.run());
    debug!(session = %id, depth = queue.depth(), "Session task spawned");

    SessionHandle {
        id,
        queue,
        sink,
        commands: command_tx,
        cancel,
        join,
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.queue.is_closed()
    }

    /// Frames evicted by drop-oldest so far.
    pub fn frames_evicted(&self) -> u64 {
        self.queue.dropped()
    }

    /// Live ingestion: never waits, evicts the oldest queued frame when full.
    pub fn submit(&self, frame: LandmarkFrame) -> Result<PushOutcome> {
        match self.queue.push(frame) {
            PushOutcome::Closed => Err(EngineError::SessionClosed(self.id)),
            outcome => {
                if let PushOutcome::DroppedOldest(sequence) = outcome {
                    debug!(session = %self.id, evicted = sequence, "Queue full, oldest frame evicted");
                }
                Ok(outcome)
            }
        }
    }

    /// Replay ingestion: waits for queue space instead of evicting.
    pub async fn submit_lossless(&self, frame: LandmarkFrame) -> Result<PushOutcome> {
        match self.queue.push_when_ready(frame).await {
            PushOutcome::Closed => Err(EngineError::SessionClosed(self.id)),
            outcome => Ok(outcome),
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| EngineError::SessionClosed(self.id))?;
        rx.await.map_err(|_| EngineError::SessionClosed(self.id))
    }

    /// Confirmed statuses, served between frames.
    pub async fn snapshot(&self) -> Result<RuleStatusSnapshot> {
        self.request(SessionCommand::Snapshot).await
    }

    /// Move the session to another library pose (operator override).
    pub async fn switch_pose(&self, pose_id: &str) -> Result<()> {
        let pose_id = pose_id.to_string();
        self.request(|reply| SessionCommand::SwitchPose { pose_id, reply })
            .await?
    }

    /// Wait until every frame submitted so far has been processed.
    pub async fn drain(&self) -> Result<()> {
        self.request(SessionCommand::Flush).await
    }

    /// Stop the session and return its summary.
    pub async fn shutdown(self) -> Result<SessionSummary> {
        self.sink.close();
        self.queue.close();
        self.cancel.cancel();
        let summary = self
            .join
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?;
        debug!(session = %self.id, sink_closed = self.sink.is_closed(), "Session task joined");
        Ok(summary)
    }
}
