//! Timed in-process playback engine
//!
//! Plays nothing; each playback simply lasts for a duration derived from the
//! word count of its text, and can be cancelled part way through.

use super::{PlaybackEngine, PlaybackHandle, PlaybackId, PlaybackOutcome};
use crate::{Result, TurnError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Granularity at which a running playback checks for cancellation
const TICK: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
pub struct SimulatedPlaybackConfig {
    /// Playback time per word of text
    pub ms_per_word: u64,
    /// Lower bound for any playback, including empty text
    pub min_duration_ms: u64,
}

impl Default for SimulatedPlaybackConfig {
    fn default() -> Self {
        Self {
            ms_per_word: 250,
            min_duration_ms: 100,
        }
    }
}

impl SimulatedPlaybackConfig {
    pub fn with_ms_per_word(mut self, ms: u64) -> Self {
        self.ms_per_word = ms;
        self
    }

    pub fn with_min_duration_ms(mut self, ms: u64) -> Self {
        self.min_duration_ms = ms;
        self
    }

    /// How long `text` plays for
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        Duration::from_millis(words.saturating_mul(self.ms_per_word).max(self.min_duration_ms))
    }
}

#[derive(Default)]
pub struct SimulatedPlayback {
    config: SimulatedPlaybackConfig,
    /// Cancellation flags of playbacks still running
    active: Arc<Mutex<HashMap<PlaybackId, Arc<AtomicBool>>>>,
    /// Texts of every playback that started, in order
    started: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl SimulatedPlayback {
    pub fn new(config: SimulatedPlaybackConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Make subsequent `start_playback` calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn started_texts(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

impl PlaybackEngine for SimulatedPlayback {
    fn start_playback(&self, text: &str) -> Result<PlaybackHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TurnError::PlaybackError(format!(
                "simulated synthesis failure for '{}'",
                text
            )));
        }

        let (handle, done_tx) = PlaybackHandle::channel();
        let id = handle.id();
        let cancelled = Arc::new(AtomicBool::new(false));
        let duration = self.config.duration_for(text);

        self.active.lock().insert(id, Arc::clone(&cancelled));
        self.started.lock().push(text.to_string());
        info!("Simulated playback {} started ({:?}): '{}'", id, duration, text);

        let active = Arc::clone(&self.active);
        thread::spawn(move || {
            let deadline = Instant::now() + duration;
            let outcome = loop {
                if cancelled.load(Ordering::SeqCst) {
                    break PlaybackOutcome::Cancelled;
                }
                let now = Instant::now();
                if now >= deadline {
                    break PlaybackOutcome::Finished;
                }
                thread::sleep(TICK.min(deadline - now));
            };

            active.lock().remove(&id);
            debug!("Simulated playback {} ended: {:?}", id, outcome);
            let _ = done_tx.send(outcome);
        });

        Ok(handle)
    }

    fn cancel(&self, id: PlaybackId) {
        match self.active.lock().get(&id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                debug!("Simulated playback {} cancellation requested", id);
            }
            None => debug!("Simulated playback {} already ended, cancel is a no-op", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> SimulatedPlayback {
        SimulatedPlayback::new(
            SimulatedPlaybackConfig::default()
                .with_ms_per_word(10)
                .with_min_duration_ms(10),
        )
    }

    #[test]
    fn test_duration_for() {
        let config = SimulatedPlaybackConfig::default()
            .with_ms_per_word(100)
            .with_min_duration_ms(50);
        assert_eq!(config.duration_for("one two three"), Duration::from_millis(300));
        assert_eq!(config.duration_for(""), Duration::from_millis(50));
    }

    #[test]
    fn test_duration_for_saturates() {
        let config = SimulatedPlaybackConfig::default().with_ms_per_word(u64::MAX / 2);
        assert_eq!(
            config.duration_for("one two three"),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_playback_finishes() {
        let engine = fast();
        let handle = engine.start_playback("hello there").unwrap();
        assert_eq!(handle.wait(), PlaybackOutcome::Finished);
        assert_eq!(engine.started_texts(), vec!["hello there"]);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_playback_cancelled() {
        let engine = SimulatedPlayback::new(SimulatedPlaybackConfig::default().with_ms_per_word(1000));
        let handle = engine.start_playback("a long answer").unwrap();
        engine.cancel(handle.id());
        assert_eq!(handle.wait(), PlaybackOutcome::Cancelled);
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let engine = fast();
        let handle = engine.start_playback("hi").unwrap();
        assert_eq!(handle.wait(), PlaybackOutcome::Finished);

        engine.cancel(handle.id());
        engine.cancel(handle.id());
        engine.cancel(PlaybackId::new());
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_failing_start() {
        let engine = fast();
        engine.set_failing(true);
        let err = engine.start_playback("hello").unwrap_err();
        assert!(matches!(err, TurnError::PlaybackError(_)));
        assert!(engine.started_texts().is_empty());

        engine.set_failing(false);
        assert!(engine.start_playback("hello").is_ok());
    }
}
