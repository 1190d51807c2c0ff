//! Bounded drop-oldest frame queue between ingestion and a session task
//!
//! Live camera input must never back up: when the session falls behind, the
//! stalest frame is discarded so the next one processed is as fresh as
//! possible. Depth is 1 or 2.

use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::types::LandmarkFrame;

/// Result of pushing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; the frame with this sequence number was evicted
    DroppedOldest(u64),
    /// Queue is closed; the frame was discarded
    Closed,
}

#[derive(Debug, Default)]
struct QueueInner {
    frames: VecDeque<LandmarkFrame>,
    closed: bool,
    dropped: u64,
}

#[derive(Debug)]
pub struct FrameQueue {
    inner: Mutex<QueueInner>,
    depth: usize,
    /// Signalled when a frame arrives or the queue closes
    available: Notify,
    /// Signalled when a frame is taken or the queue closes
    space: Notify,
}

impl FrameQueue {
    /// `depth` is clamped to 1..=2.
    pub fn new(depth: usize) -> Self {
        let depth = depth.clamp(1, 2);
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(depth),
                ..Default::default()
            }),
            depth,
            available: Notify::new(),
            space: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enqueue a frame, evicting the oldest one if the queue is full.
    pub fn push(&self, frame: LandmarkFrame) -> PushOutcome {
        let outcome = {
            let mut inner = self.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            let outcome = if inner.frames.len() >= self.depth {
                let evicted = inner.frames.pop_front().map_or(0, |f| f.sequence);
                inner.dropped += 1;
                PushOutcome::DroppedOldest(evicted)
            } else {
                PushOutcome::Queued
            };
            inner.frames.push_back(frame);
            outcome
        };
        self.available.notify_one();
        outcome
    }

    /// Wait until the queue has room (or is closed), then push.
    ///
    /// Lossless path for file replay; live ingestion uses `push`.
    pub async fn push_when_ready(&self, frame: LandmarkFrame) -> PushOutcome {
        loop {
            let space = self.space.notified();
            tokio::pin!(space);
            space.as_mut().enable();
            {
                let inner = self.lock();
                if inner.closed || inner.frames.len() < self.depth {
                    break;
                }
            }
            space.await;
        }
        self.push(frame)
    }

    /// Take the oldest frame, waiting if the queue is empty.
    ///
    /// Returns `None` once the queue is closed; frames still queued at that
    /// point are discarded.
    pub async fn pop(&self) -> Option<LandmarkFrame> {
        loop {
            let available = self.available.notified();
            tokio::pin!(available);
            available.as_mut().enable();
            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(frame) = inner.frames.pop_front() {
                    drop(inner);
                    self.space.notify_one();
                    return Some(frame);
                }
            }
            available.await;
        }
    }

    /// Close the queue, discarding pending frames and waking every waiter.
    pub fn close(&self) {
        {
            let mut inner = self.lock();
            inner.closed = true;
            inner.frames.clear();
        }
        self.available.notify_waiters();
        self.space.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames evicted by drop-oldest since creation.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}
