//! Concurrent session runtime
//!
//! ```text
//! FrameSource ──► ProcessingLoop ──► FrameQueue (depth 1-2, drop-oldest)
//!                                        │
//!                                        ▼
//!                              session task (PoseSession)
//!                                        │
//!                              EventSink ──► SessionEvent channel
//! ```
//!
//! `SessionManager` owns the handles of many independent sessions.

pub mod manager;
pub mod processing_loop;
pub mod queue;
pub mod session_task;
pub mod source;

pub use manager::SessionManager;
pub use processing_loop::{IngestMode, LoopStats, ProcessingLoop};
pub use queue::{FrameQueue, PushOutcome};
pub use session_task::{spawn_session, EventSink, SessionEvent, SessionHandle, SessionSummary};
pub use source::{load_frames, parse_frame_line, FrameEvent, FrameSource, Pacing, ReplaySource, StdinSource};
