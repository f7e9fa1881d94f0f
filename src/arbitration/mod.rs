//! Arbitration of user fragments against the agent's speaking state
//!
//! - `fragment`: normalized, tokenized transcript fragments
//! - `lexicon`: filler / interrupt word classification
//! - `policy`: the decision table producing an `Action`

pub mod fragment;
pub mod lexicon;
pub mod policy;

pub use fragment::Fragment;
pub use lexicon::{Classification, Lexicon, LexiconConfig};
pub use policy::{arbitrate, decide, Action};
