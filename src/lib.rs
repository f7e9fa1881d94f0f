//! Turnkeeper - turn-taking arbitration for spoken-dialogue agents
//!
//! Decides, per transcribed user fragment, whether to ignore it, forward it
//! as the next turn, or interrupt the agent's speech and forward it.

pub mod arbitration;
pub mod generator;
pub mod playback;
pub mod scenario;
pub mod session;
pub mod utils;

pub use arbitration::{decide, Action, Classification, Fragment, Lexicon, LexiconConfig};
pub use generator::{ChannelGenerator, ResponseGenerator};
pub use playback::{PlaybackEngine, PlaybackHandle, PlaybackId, PlaybackOutcome, SimulatedPlayback};
pub use session::{
    Session, SessionCommand, SessionConfig, SessionEvent, SessionHandle, SessionStats,
    SpeakingGuard, SpeakingState, SpeakingStateTracker,
};

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TurnError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Response generator error: {0}")]
    GeneratorError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Scenario error: {0}")]
    ScenarioError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for TurnError {
    fn from(e: std::io::Error) -> Self {
        TurnError::IOError(e.to_string())
    }
}

impl TurnError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors are local to one fragment or one agent turn; the
    /// session keeps running after them.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TurnError::ConfigError(_) => false,
            // A failed or refused playback only loses that turn
            TurnError::PlaybackError(_) => true,
            TurnError::GeneratorError(_) => true,
            // The session worker is gone
            TurnError::ChannelError(_) => false,
            TurnError::ScenarioError(_) => false,
            TurnError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            TurnError::ConfigError(_) => {
                "Configuration error. Please check the word lists and settings.".to_string()
            }
            TurnError::PlaybackError(_) => {
                "Speech playback failed. The reply will be skipped.".to_string()
            }
            TurnError::GeneratorError(_) => {
                "Could not hand the message to the assistant. Please try again.".to_string()
            }
            TurnError::ChannelError(_) => {
                "Internal communication error. Please restart the session.".to_string()
            }
            TurnError::ScenarioError(_) => "Scenario file is invalid.".to_string(),
            TurnError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_failures_are_recoverable() {
        assert!(TurnError::PlaybackError("device busy".into()).is_recoverable());
        assert!(TurnError::GeneratorError("closed".into()).is_recoverable());
        assert!(!TurnError::ConfigError("overlap".into()).is_recoverable());
        assert!(!TurnError::ChannelError("gone".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let err: TurnError = io.into();
        assert!(matches!(err, TurnError::IOError(ref msg) if msg.contains("missing.toml")));
    }
}
