//! Session orchestration
//!
//! A session owns the agent's speaking state, consumes transcript fragments
//! in arrival order, and brackets every playback it starts.

pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::SessionConfig;
pub use orchestrator::{Session, SessionCommand, SessionEvent, SessionHandle};
pub use state::{SessionStats, SpeakingGuard, SpeakingState, SpeakingStateTracker};
