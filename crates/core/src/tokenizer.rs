use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Terms must be longer than this many characters.
pub const MIN_TERM_EXCLUSIVE_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopWords(HashSet<String>);

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(words.into_iter().map(Into::into).collect())
    }

    /// Closed-class words filtered out of catalog queries before keyword
    /// matching.
    pub fn query_words() -> Self {
        Self::new([
            "que", "cual", "cuales", "cuanto", "como", "donde", "quien", "cuando", "hay",
            "tiene", "tengan", "con", "sin", "por", "para", "entre", "los", "las", "uno", "una",
            "unos", "unas", "del", "desde", "hasta", "hacia", "durante", "mediante", "según",
            "sobre", "tras", "versus",
        ])
    }

    /// Articles and prepositions, used when ranking document passages.
    pub fn passage_words() -> Self {
        Self::new([
            "el", "la", "los", "las", "un", "una", "unos", "unas", "y", "o", "a", "ante", "bajo",
            "con", "de", "desde", "en", "entre", "hacia", "hasta", "para", "por", "según", "sin",
            "sobre", "tras",
        ])
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }
}

/// Keeps letters (accented ones and ñ included) and digits.
pub fn normalize_token(raw: &str) -> String {
    raw.chars().filter(|ch| ch.is_alphanumeric()).collect()
}

/// Lowercases, splits on whitespace, strips punctuation and drops short
/// tokens, stop words and repeats. First occurrence order is kept.
pub fn extract_terms(text: &str, stop_words: &StopWords) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split_whitespace()
        .map(normalize_token)
        .filter(|term| term.chars().count() > MIN_TERM_EXCLUSIVE_CHARS)
        .filter(|term| !stop_words.contains(term))
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

/// Every run of ASCII digits in `text`, in order. Runs too long for `u64`
/// are skipped.
pub fn extract_numbers(text: &str) -> Vec<u64> {
    text.split(|ch: char| !ch.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse::<u64>().ok())
        .collect()
}
