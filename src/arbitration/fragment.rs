use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chunk of transcribed user speech
///
/// Built once per transcript event and never mutated. `text` is the
/// lowercased, trimmed form of `raw`; `words` are its whitespace tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: Uuid,
    pub raw: String,
    pub text: String,
    pub words: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl Fragment {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = raw.trim().to_lowercase();
        let words = text.split_whitespace().map(str::to_string).collect();

        Self {
            id: Uuid::new_v4(),
            raw,
            text,
            words,
            received_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let fragment = Fragment::new("  STOP now ");
        assert_eq!(fragment.raw, "  STOP now ");
        assert_eq!(fragment.text, "stop now");
        assert_eq!(fragment.words, vec!["stop", "now"]);
    }

    #[test]
    fn test_inner_whitespace_collapses() {
        let fragment = Fragment::new("what\ttime   is\nit");
        assert_eq!(fragment.words, vec!["what", "time", "is", "it"]);
        assert_eq!(fragment.word_count(), 4);
    }

    #[test]
    fn test_blank_fragment_is_empty() {
        assert!(Fragment::new("").is_empty());
        assert!(Fragment::new(" \t\n ").is_empty());
        assert!(!Fragment::new("hmm").is_empty());
    }

    #[test]
    fn test_fragments_get_distinct_ids() {
        let a = Fragment::new("yeah");
        let b = Fragment::new("yeah");
        assert_ne!(a.id, b.id);
        assert_eq!(a.words, b.words);
    }
}
