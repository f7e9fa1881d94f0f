use crate::arbitration::LexiconConfig;

/// Configuration for one conversational session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Filler / interrupt word lists
    pub lexicon: LexiconConfig,
    /// Agent turn played as soon as the session starts
    pub greeting: Option<String>,
    /// Buffer size of the command and event channels, at least 1
    pub channel_buffer_size: usize,
    /// How long shutdown waits for running playbacks to end
    ///
    /// A playback that outlives this timeout (an engine that ignores
    /// `cancel`) keeps the speaking state at `Speaking` until it finally
    /// ends, even after `SessionEvent::Shutdown` has been emitted.
    pub shutdown_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lexicon: LexiconConfig::default(),
            greeting: None,
            channel_buffer_size: 100,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lexicon(mut self, lexicon: LexiconConfig) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, timeout: u64) -> Self {
        self.shutdown_timeout_ms = timeout;
        self
    }
}
