use crate::playback::{PlaybackId, PlaybackOutcome};
use crate::session::{SessionCommand, SessionEvent};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// Sent by a playback watcher once the speaking state is back to idle
#[derive(Debug, Clone)]
pub struct PlaybackCompletion {
    pub id: PlaybackId,
    pub outcome: PlaybackOutcome,
}

pub struct SessionChannels {
    pub command_tx: Sender<SessionCommand>,
    pub command_rx: Receiver<SessionCommand>,
    pub event_tx: Sender<SessionEvent>,
    pub event_rx: Receiver<SessionEvent>,
    pub completion_tx: Sender<PlaybackCompletion>,
    pub completion_rx: Receiver<PlaybackCompletion>,
}

impl SessionChannels {
    pub fn new(buffer_size: usize) -> Self {
        let (command_tx, command_rx) = bounded(buffer_size);
        let (event_tx, event_rx) = bounded(buffer_size);
        // Watchers must never block after releasing the speaking state
        let (completion_tx, completion_rx) = unbounded();

        Self {
            command_tx,
            command_rx,
            event_tx,
            event_rx,
            completion_tx,
            completion_rx,
        }
    }
}

impl Default for SessionChannels {
    fn default() -> Self {
        Self::new(100)
    }
}
