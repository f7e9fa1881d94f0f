//! Session orchestrator
//!
//! Runs one worker thread per session that:
//! - arbitrates transcript fragments strictly in arrival order
//! - forwards user turns to the response generator
//! - starts agent playbacks one at a time, queueing the rest
//! - cancels the active playback when the user takes the floor
//!
//! Each playback is awaited on its own watcher thread that owns the
//! `SpeakingGuard`, so the idle transition happens however the playback ends.

use super::config::SessionConfig;
use super::state::{SessionStats, SharedStats, SpeakingState, SpeakingStateTracker};
use crate::arbitration::{arbitrate, Action, Fragment, Lexicon};
use crate::generator::ResponseGenerator;
use crate::playback::{PlaybackEngine, PlaybackId, PlaybackOutcome};
use crate::utils::{PlaybackCompletion, SessionChannels};
use crate::{Result, TurnError};
use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Requests accepted by a running session
#[derive(Clone, Debug)]
pub enum SessionCommand {
    /// A transcribed user utterance segment
    Transcript(String),
    /// An agent turn to play (greeting, generated reply)
    Speak(String),
    /// Cancel playback and stop the worker
    Shutdown,
}

/// Notifications emitted by a session
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A fragment was arbitrated and its action carried out
    Arbitrated {
        fragment: Fragment,
        state: SpeakingState,
        action: Action,
    },
    /// A fragment reached the response generator
    Forwarded(Fragment),
    /// An agent playback began
    PlaybackStarted { id: PlaybackId, text: String },
    /// An agent playback ended and the agent is idle again
    PlaybackEnded {
        id: PlaybackId,
        outcome: PlaybackOutcome,
    },
    /// An agent playback could not be started
    PlaybackFailed(String),
    /// A recoverable error occurred
    Error(String),
    /// The worker has stopped
    Shutdown,
}

/// Handle for driving a session from the transport side
pub struct SessionHandle {
    command_tx: Sender<SessionCommand>,
    event_rx: Receiver<SessionEvent>,
    tracker: SpeakingStateTracker,
    stats: SharedStats,
}

impl SessionHandle {
    /// Send a command to the session
    ///
    /// Blocks while the command channel is full.
    pub fn send_command(&self, cmd: SessionCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| TurnError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Deliver a transcript fragment for arbitration
    pub fn submit_transcript(&self, text: impl Into<String>) -> Result<()> {
        self.send_command(SessionCommand::Transcript(text.into()))
    }

    /// Ask the session to play an agent turn
    pub fn speak(&self, text: impl Into<String>) -> Result<()> {
        self.send_command(SessionCommand::Speak(text.into()))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send_command(SessionCommand::Shutdown)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> Result<SessionEvent> {
        self.event_rx
            .recv()
            .map_err(|e| TurnError::ChannelError(format!("Failed to receive event: {}", e)))
    }

    /// Receive an event, giving up after `timeout`
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn event_receiver(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    pub fn speaking_state(&self) -> SpeakingState {
        self.tracker.snapshot()
    }

    pub fn is_speaking(&self) -> bool {
        self.tracker.is_speaking()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.snapshot()
    }
}

/// One conversational session, ready to be started
pub struct Session {
    config: SessionConfig,
    lexicon: Arc<Lexicon>,
    tracker: SpeakingStateTracker,
    stats: SharedStats,
    playback: Arc<dyn PlaybackEngine>,
    generator: Arc<dyn ResponseGenerator>,
    channels: SessionChannels,
}

impl Session {
    /// Create a session, building its lexicon from `config.lexicon`
    ///
    /// The session must be started with `start()` to begin processing.
    pub fn new(
        config: SessionConfig,
        playback: Arc<dyn PlaybackEngine>,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Result<(Self, SessionHandle)> {
        let lexicon = Arc::new(Lexicon::from_config(&config.lexicon)?);
        Self::with_lexicon(config, lexicon, playback, generator)
    }

    /// Create a session sharing an already built lexicon
    ///
    /// `config.lexicon` is ignored.
    pub fn with_lexicon(
        config: SessionConfig,
        lexicon: Arc<Lexicon>,
        playback: Arc<dyn PlaybackEngine>,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Result<(Self, SessionHandle)> {
        // A rendezvous event channel would drop every event nobody is blocked on
        if config.channel_buffer_size == 0 {
            return Err(TurnError::ConfigError(
                "channel_buffer_size must be at least 1".to_string(),
            ));
        }
        let channels = SessionChannels::new(config.channel_buffer_size);
        let tracker = SpeakingStateTracker::new();
        let stats = SharedStats::default();

        let handle = SessionHandle {
            command_tx: channels.command_tx.clone(),
            event_rx: channels.event_rx.clone(),
            tracker: tracker.clone(),
            stats: stats.clone(),
        };

        let session = Self {
            config,
            lexicon,
            tracker,
            stats,
            playback,
            generator,
            channels,
        };

        Ok((session, handle))
    }

    /// Start the session worker
    ///
    /// Plays the configured greeting first, then serves commands until
    /// shutdown or until every handle is dropped.
    pub fn start(self) -> Result<JoinHandle<()>> {
        let shutdown_timeout = Duration::from_millis(self.config.shutdown_timeout_ms);
        let greeting = self.config.greeting.clone();

        let mut worker = SessionWorker {
            lexicon: self.lexicon,
            tracker: self.tracker,
            stats: self.stats,
            playback: self.playback,
            generator: self.generator,
            command_rx: self.channels.command_rx,
            event_tx: self.channels.event_tx,
            completion_tx: self.channels.completion_tx,
            completion_rx: self.channels.completion_rx,
            active: None,
            pending: VecDeque::new(),
            watchers: Vec::new(),
            shutdown_timeout,
        };

        thread::Builder::new()
            .name("turnkeeper-session".to_string())
            .spawn(move || {
                info!("Session worker starting");
                if let Some(text) = greeting {
                    worker.request_speech(text);
                }
                worker.run();
                info!("Session worker stopped");
            })
            .map_err(TurnError::from)
    }
}

struct SessionWorker {
    lexicon: Arc<Lexicon>,
    tracker: SpeakingStateTracker,
    stats: SharedStats,
    playback: Arc<dyn PlaybackEngine>,
    generator: Arc<dyn ResponseGenerator>,
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    completion_tx: Sender<PlaybackCompletion>,
    completion_rx: Receiver<PlaybackCompletion>,
    /// Playback currently bracketed by a watcher
    active: Option<PlaybackId>,
    /// Agent turns waiting for the active playback to end
    pending: VecDeque<String>,
    watchers: Vec<(PlaybackId, JoinHandle<()>)>,
    shutdown_timeout: Duration,
}

impl SessionWorker {
    fn run(&mut self) {
        let command_rx = self.command_rx.clone();
        let completion_rx = self.completion_rx.clone();

        loop {
            select! {
                recv(command_rx) -> cmd => match cmd {
                    Ok(SessionCommand::Transcript(text)) => self.handle_transcript(text),
                    Ok(SessionCommand::Speak(text)) => self.request_speech(text),
                    Ok(SessionCommand::Shutdown) => {
                        info!("Session shutdown requested");
                        break;
                    }
                    Err(_) => {
                        warn!("Command channel disconnected");
                        break;
                    }
                },

                recv(completion_rx) -> completion => {
                    if let Ok(completion) = completion {
                        self.handle_completion(completion);
                    }
                }
            }
        }

        self.shutdown();
    }

    fn handle_transcript(&mut self, text: String) {
        let fragment = Fragment::new(text);
        let state = self.tracker.snapshot();
        let action = arbitrate(&self.lexicon, &fragment, state);

        info!("User said: '{}'", fragment.raw);
        debug!("Arbitrated '{}' while {}: {}", fragment.text, state, action);

        self.stats.update(|s| s.fragments += 1);

        match action {
            Action::Ignore => {
                self.stats.update(|s| s.ignored += 1);
                info!("Agent is speaking, ignoring filler '{}'", fragment.text);
            }
            Action::Forward => self.forward(&fragment),
            Action::InterruptAndForward => {
                self.interrupt();
                self.forward(&fragment);
            }
        }

        self.emit(SessionEvent::Arbitrated {
            fragment,
            state,
            action,
        });
    }

    /// Request cancellation of the active playback without waiting for it
    fn interrupt(&mut self) {
        self.stats.update(|s| s.interrupted += 1);

        let discarded = self.pending.len();
        self.pending.clear();
        if discarded > 0 {
            debug!("Discarded {} queued agent turns", discarded);
        }

        match self.active {
            Some(id) => {
                info!("Interrupting agent playback {}", id);
                self.playback.cancel(id);
                self.stats.update(|s| s.cancellations_requested += 1);
            }
            None => debug!("Playback already ended before the interrupt"),
        }
    }

    fn forward(&mut self, fragment: &Fragment) {
        match self.generator.forward(fragment) {
            Ok(()) => {
                self.stats.update(|s| s.forwarded += 1);
                debug!("Forwarded '{}' to response generator", fragment.text);
                self.emit(SessionEvent::Forwarded(fragment.clone()));
            }
            Err(e) => {
                error!("Failed to forward fragment: {}", e);
                self.emit(SessionEvent::Error(e.to_string()));
            }
        }
    }

    fn request_speech(&mut self, text: String) {
        self.pending.push_back(text);
        if self.active.is_some() {
            debug!("Playback active, {} agent turns queued", self.pending.len());
            return;
        }
        self.start_next_playback();
    }

    /// Start queued agent turns until one is playing or the queue is empty
    fn start_next_playback(&mut self) {
        while self.active.is_none() {
            let Some(text) = self.pending.pop_front() else {
                break;
            };
            if let Err(e) = self.start_playback(text) {
                self.stats.update(|s| s.playback_failures += 1);
                error!("Playback failed to start: {}", e);
                self.emit(SessionEvent::PlaybackFailed(e.to_string()));
            }
        }
    }

    fn start_playback(&mut self, text: String) -> Result<()> {
        let guard = self.tracker.begin_speaking();
        // On error the guard drops here and the agent is idle again
        let handle = self.playback.start_playback(&text)?;
        let id = handle.id();

        let completion_tx = self.completion_tx.clone();
        let watcher = thread::Builder::new()
            .name(format!("turnkeeper-playback-{}", id))
            .spawn(move || {
                let outcome = handle.wait();
                guard.finish();
                let _ = completion_tx.send(PlaybackCompletion { id, outcome });
            });

        match watcher {
            Ok(watcher) => {
                self.watchers.retain(|(_, w)| !w.is_finished());
                self.watchers.push((id, watcher));
            }
            Err(e) => {
                // Nobody would observe the end of this playback
                self.playback.cancel(id);
                return Err(TurnError::PlaybackError(format!(
                    "Failed to spawn playback watcher: {}",
                    e
                )));
            }
        }

        self.active = Some(id);
        self.stats.update(|s| s.playbacks_started += 1);
        info!("Agent playback {} started: '{}'", id, text);
        self.emit(SessionEvent::PlaybackStarted { id, text });
        Ok(())
    }

    fn handle_completion(&mut self, completion: PlaybackCompletion) {
        let PlaybackCompletion { id, outcome } = completion;
        if self.active == Some(id) {
            self.active = None;
        }

        match &outcome {
            PlaybackOutcome::Finished => info!("Agent playback {} finished", id),
            PlaybackOutcome::Cancelled => info!("Agent playback {} cancelled", id),
            PlaybackOutcome::Failed(reason) => {
                self.stats.update(|s| s.playback_failures += 1);
                error!("Agent playback {} failed: {}", id, reason);
            }
        }
        self.emit(SessionEvent::PlaybackEnded { id, outcome });

        self.start_next_playback();
    }

    fn shutdown(&mut self) {
        self.pending.clear();
        if let Some(id) = self.active.take() {
            self.playback.cancel(id);
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        while self.watchers.iter().any(|(_, w)| !w.is_finished()) {
            if Instant::now() > deadline {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        for (id, watcher) in self.watchers.drain(..) {
            if watcher.is_finished() {
                let _ = watcher.join();
            } else {
                // The detached watcher still holds the speaking guard
                warn!(
                    "Shutdown timeout reached with playback {} still running, state stays speaking until it ends",
                    id
                );
            }
        }

        // Report playbacks that ended while shutting down
        while let Ok(PlaybackCompletion { id, outcome }) = self.completion_rx.try_recv() {
            self.emit(SessionEvent::PlaybackEnded { id, outcome });
        }

        self.emit(SessionEvent::Shutdown);
        info!("Session shutdown complete");
    }

    /// Deliver an event without ever blocking the worker
    fn emit(&self, event: SessionEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!("Event channel full, dropping {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
