//! Speaking state shared between the session worker and playback watchers
//!
//! The state is written from two execution contexts (the worker starting a
//! playback, the watcher thread ending it) and read on every fragment, so it
//! lives behind a lock and is only reachable through the tracker's methods.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Agent playback state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakingState {
    /// No agent speech in progress
    #[default]
    Idle,
    /// Agent speech is playing
    Speaking,
}

impl SpeakingState {
    pub fn is_speaking(&self) -> bool {
        matches!(self, SpeakingState::Speaking)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SpeakingState::Idle)
    }
}

impl std::fmt::Display for SpeakingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeakingState::Idle => write!(f, "Idle"),
            SpeakingState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Thread-safe owner of one session's `SpeakingState`
///
/// Clones share the same state. Every read returns a whole value written by
/// a completed transition.
#[derive(Clone, Debug, Default)]
pub struct SpeakingStateTracker {
    inner: Arc<RwLock<SpeakingState>>,
}

impl SpeakingStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state (lock released on return)
    pub fn snapshot(&self) -> SpeakingState {
        *self.inner.read()
    }

    pub fn is_speaking(&self) -> bool {
        self.snapshot().is_speaking()
    }

    pub fn mark_speaking(&self) {
        let previous = std::mem::replace(&mut *self.inner.write(), SpeakingState::Speaking);
        debug!("Speaking state: {} -> Speaking", previous);
    }

    pub fn mark_idle(&self) {
        let previous = std::mem::replace(&mut *self.inner.write(), SpeakingState::Idle);
        debug!("Speaking state: {} -> Idle", previous);
    }

    /// Mark speaking and return a guard that marks idle when dropped
    ///
    /// The guard is the single bracketing construct around a playback: it
    /// resets the state on normal return, early `?` return and unwinding.
    pub fn begin_speaking(&self) -> SpeakingGuard {
        self.mark_speaking();
        SpeakingGuard {
            tracker: self.clone(),
        }
    }
}

/// Holds the tracker in `Speaking` for as long as it lives
#[must_use = "dropping the guard immediately marks the agent idle"]
#[derive(Debug)]
pub struct SpeakingGuard {
    tracker: SpeakingStateTracker,
}

impl SpeakingGuard {
    /// End the bracketed playback explicitly
    pub fn finish(self) {
        drop(self);
    }
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        self.tracker.mark_idle();
    }
}

/// Per-session counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub fragments: u64,
    pub ignored: u64,
    pub forwarded: u64,
    pub interrupted: u64,
    pub playbacks_started: u64,
    pub playback_failures: u64,
    pub cancellations_requested: u64,
}

/// `SessionStats` shared between the worker and the handle
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedStats {
    inner: Arc<Mutex<SessionStats>>,
}

impl SharedStats {
    pub(crate) fn update(&self, f: impl FnOnce(&mut SessionStats)) {
        f(&mut self.inner.lock());
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_initial_state_is_idle() {
        let tracker = SpeakingStateTracker::new();
        assert_eq!(tracker.snapshot(), SpeakingState::Idle);
        assert!(!tracker.is_speaking());
    }

    #[test]
    fn test_mark_transitions() {
        let tracker = SpeakingStateTracker::new();
        tracker.mark_speaking();
        assert!(tracker.snapshot().is_speaking());
        tracker.mark_idle();
        assert!(tracker.snapshot().is_idle());
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = SpeakingStateTracker::new();
        let other = tracker.clone();
        tracker.mark_speaking();
        assert!(other.is_speaking());
    }

    #[test]
    fn test_guard_resets_on_drop() {
        let tracker = SpeakingStateTracker::new();
        {
            let _guard = tracker.begin_speaking();
            assert!(tracker.is_speaking());
        }
        assert!(!tracker.is_speaking());

        let guard = tracker.begin_speaking();
        guard.finish();
        assert!(!tracker.is_speaking());
    }

    #[test]
    fn test_guard_resets_on_error_path() {
        fn synthesize() -> Result<(), String> {
            Err("synthesis failed".to_string())
        }

        fn failing_playback(tracker: &SpeakingStateTracker) -> Result<(), String> {
            let _guard = tracker.begin_speaking();
            synthesize()?;
            Ok(())
        }

        let tracker = SpeakingStateTracker::new();
        assert!(failing_playback(&tracker).is_err());
        assert_eq!(tracker.snapshot(), SpeakingState::Idle);
    }

    #[test]
    fn test_guard_resets_on_panic() {
        let tracker = SpeakingStateTracker::new();
        let worker_tracker = tracker.clone();

        let result = thread::spawn(move || {
            let _guard = worker_tracker.begin_speaking();
            panic!("playback thread panicked");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(tracker.snapshot(), SpeakingState::Idle);
    }

    #[test]
    fn test_concurrent_reads_see_whole_values() {
        let tracker = SpeakingStateTracker::new();

        let writer = {
            let tracker = tracker.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let guard = tracker.begin_speaking();
                    guard.finish();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let state = tracker.snapshot();
                        assert!(matches!(state, SpeakingState::Idle | SpeakingState::Speaking));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        // Every bracket closed
        assert_eq!(tracker.snapshot(), SpeakingState::Idle);
    }

    #[test]
    fn test_stats_update() {
        let stats = SharedStats::default();
        stats.update(|s| {
            s.fragments += 2;
            s.ignored += 1;
        });
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.fragments, 2);
        assert_eq!(snapshot.ignored, 1);
        assert_eq!(snapshot.forwarded, 0);
    }
}
