use super::fragment::Fragment;
use super::lexicon::{Classification, Lexicon};
use crate::session::SpeakingState;
use serde::{Deserialize, Serialize};

/// What the session does with a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Drop the fragment
    Ignore,
    /// Hand the fragment to the response generator, leave playback alone
    Forward,
    /// Cancel the active playback, then hand the fragment over
    InterruptAndForward,
}

impl Action {
    pub fn is_forwarded(&self) -> bool {
        !matches!(self, Action::Ignore)
    }

    pub fn interrupts(&self) -> bool {
        matches!(self, Action::InterruptAndForward)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Ignore => write!(f, "ignore"),
            Action::Forward => write!(f, "forward"),
            Action::InterruptAndForward => write!(f, "interrupt_and_forward"),
        }
    }
}

/// Decide what to do with a classified fragment
///
/// While the agent is idle every fragment is the user's turn. While it is
/// speaking, an interrupt word always wins, a filler-only fragment is
/// suppressed, and anything else takes the floor from the agent.
pub fn decide(classification: Classification, state: SpeakingState) -> Action {
    match state {
        SpeakingState::Idle => Action::Forward,
        SpeakingState::Speaking => {
            if classification.has_interrupt_word {
                Action::InterruptAndForward
            } else if classification.all_filler_or_empty {
                Action::Ignore
            } else {
                Action::InterruptAndForward
            }
        }
    }
}

/// Classify a fragment and decide on it in one step
pub fn arbitrate(lexicon: &Lexicon, fragment: &Fragment, state: SpeakingState) -> Action {
    decide(lexicon.classify(fragment), state)
}
