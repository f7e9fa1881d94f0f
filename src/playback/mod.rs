//! Playback engine interface
//!
//! The speech synthesis engine is an external collaborator. The session only
//! needs to start a playback, learn when it ends, and ask for it to be
//! cancelled.

mod simulated;

pub use simulated::{SimulatedPlayback, SimulatedPlaybackConfig};

use crate::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Identifies one playback invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackId(Uuid);

impl PlaybackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaybackId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a playback invocation ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum PlaybackOutcome {
    /// Played to the end
    Finished,
    /// Stopped by a cancellation request
    Cancelled,
    /// Failed after it started
    Failed(String),
}

/// A started playback
///
/// The engine keeps the sending half of the completion channel and sends
/// exactly one outcome when the playback ends.
#[derive(Debug)]
pub struct PlaybackHandle {
    id: PlaybackId,
    done_rx: Receiver<PlaybackOutcome>,
}

impl PlaybackHandle {
    pub fn new(id: PlaybackId, done_rx: Receiver<PlaybackOutcome>) -> Self {
        Self { id, done_rx }
    }

    /// Create a handle with a fresh id, returning the completion sender for
    /// the engine to keep
    pub fn channel() -> (Self, Sender<PlaybackOutcome>) {
        let (done_tx, done_rx) = bounded(1);
        (Self::new(PlaybackId::new(), done_rx), done_tx)
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Block until the playback ends
    ///
    /// An engine that drops the completion sender without reporting counts
    /// as a failed playback.
    pub fn wait(&self) -> PlaybackOutcome {
        self.done_rx.recv().unwrap_or_else(|_| {
            PlaybackOutcome::Failed("playback engine dropped the completion channel".to_string())
        })
    }

    /// Wait up to `timeout`; `None` if the playback is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<PlaybackOutcome> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(PlaybackOutcome::Failed(
                "playback engine dropped the completion channel".to_string(),
            )),
        }
    }
}

/// Speech playback collaborator
pub trait PlaybackEngine: Send + Sync {
    /// Start playing `text`; returns once playback has begun
    fn start_playback(&self, text: &str) -> Result<PlaybackHandle>;

    /// Request cancellation of a playback
    ///
    /// Best-effort and idempotent: cancelling a finished or unknown playback
    /// is a no-op.
    fn cancel(&self, id: PlaybackId);
}
