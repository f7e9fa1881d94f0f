//! Filler / interrupt word classification
//!
//! Two disjoint word sets are loaded once at startup:
//! - **filler words**: acknowledgements ("yeah", "hmm") that do not claim the turn
//! - **interrupt words**: explicit commands ("stop", "wait") to halt agent speech
//!
//! Any other word is ordinary content.

use super::fragment::Fragment;
use crate::{Result, TurnError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_FILLER_WORDS: &[&str] = &["yeah", "ok", "okay", "hmm", "uh-huh", "right"];

const DEFAULT_INTERRUPT_WORDS: &[&str] = &["stop", "wait", "no", "cancel"];

/// Word lists as supplied by configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// Acknowledgement tokens carrying no turn content
    pub filler_words: Vec<String>,
    /// Command tokens signalling intent to halt agent speech
    pub interrupt_words: Vec<String>,
    /// Trim leading/trailing ASCII punctuation from tokens before lookup
    pub strip_punctuation: bool,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            filler_words: DEFAULT_FILLER_WORDS.iter().map(|w| w.to_string()).collect(),
            interrupt_words: DEFAULT_INTERRUPT_WORDS.iter().map(|w| w.to_string()).collect(),
            strip_punctuation: false,
        }
    }
}

impl LexiconConfig {
    /// Load word lists from a TOML file
    ///
    /// Missing keys fall back to the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TurnError::ConfigError(format!("Failed to read lexicon '{}': {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            TurnError::ConfigError(format!("Failed to parse lexicon '{}': {}", path.display(), e))
        })
    }

    pub fn with_filler_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filler_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interrupt_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strip_punctuation(mut self, enable: bool) -> Self {
        self.strip_punctuation = enable;
        self
    }
}

/// Result of classifying one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// At least one token is an interrupt word
    pub has_interrupt_word: bool,
    /// Every token is a filler word (true for an empty fragment)
    pub all_filler_or_empty: bool,
}

/// Read-only word sets shared by every session in the process
#[derive(Debug, Clone)]
pub struct Lexicon {
    filler: HashSet<String>,
    interrupt: HashSet<String>,
    strip_punctuation: bool,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::build(&LexiconConfig::default())
    }
}

impl Lexicon {
    /// Build a lexicon, rejecting words listed in both sets
    pub fn from_config(config: &LexiconConfig) -> Result<Self> {
        let lexicon = Self::build(config);

        let mut overlap: Vec<&str> = lexicon
            .filler
            .intersection(&lexicon.interrupt)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            overlap.sort_unstable();
            return Err(TurnError::ConfigError(format!(
                "Words cannot be both filler and interrupt: {}",
                overlap.join(", ")
            )));
        }

        debug!(
            "Lexicon loaded: {} filler words, {} interrupt words",
            lexicon.filler.len(),
            lexicon.interrupt.len()
        );
        Ok(lexicon)
    }

    fn build(config: &LexiconConfig) -> Self {
        Self {
            filler: normalize_words(&config.filler_words),
            interrupt: normalize_words(&config.interrupt_words),
            strip_punctuation: config.strip_punctuation,
        }
    }

    pub fn is_filler(&self, word: &str) -> bool {
        self.filler.contains(word)
    }

    pub fn is_interrupt(&self, word: &str) -> bool {
        self.interrupt.contains(word)
    }

    /// Classify a fragment
    ///
    /// Pure: depends only on the fragment's tokens and the word sets.
    pub fn classify(&self, fragment: &Fragment) -> Classification {
        let mut has_interrupt_word = false;
        let mut all_filler_or_empty = true;

        for token in self.lookup_tokens(fragment) {
            if self.interrupt.contains(token) {
                has_interrupt_word = true;
            }
            if !self.filler.contains(token) {
                all_filler_or_empty = false;
            }
        }

        Classification {
            has_interrupt_word,
            all_filler_or_empty,
        }
    }

    /// Normalize and classify raw transcript text
    pub fn classify_text(&self, text: &str) -> Classification {
        self.classify(&Fragment::new(text))
    }

    fn lookup_tokens<'a>(&'a self, fragment: &'a Fragment) -> impl Iterator<Item = &'a str> + 'a {
        let strip = self.strip_punctuation;
        fragment
            .words
            .iter()
            .map(move |w| {
                if strip {
                    w.trim_matches(|c: char| c.is_ascii_punctuation())
                } else {
                    w.as_str()
                }
            })
            // Pure punctuation tokens ("...", "-") carry nothing once stripped
            .filter(|w| !w.is_empty())
    }
}

fn normalize_words(words: &[String]) -> HashSet<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
