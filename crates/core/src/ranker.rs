use crate::error::SearchError;
use crate::models::{ScoredChunk, TextChunk};
use crate::tokenizer::{extract_numbers, extract_terms, StopWords};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub stop_words: StopWords,
    pub max_results: usize,
    /// A term scores `occurrences * term_chars / term_length_divisor`.
    pub term_length_divisor: f64,
    /// Relative distance under which a chunk number counts as a price match.
    pub number_tolerance: f64,
    pub number_match_bonus: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            stop_words: StopWords::passage_words(),
            max_results: 5,
            term_length_divisor: 3.0,
            number_tolerance: 0.10,
            number_match_bonus: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkRanker {
    config: RankerConfig,
}

impl ChunkRanker {
    pub fn new(config: RankerConfig) -> Result<Self, SearchError> {
        if config.term_length_divisor <= 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "term_length_divisor must be positive, got {}",
                config.term_length_divisor
            )));
        }
        if config.number_tolerance < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "number_tolerance must not be negative, got {}",
                config.number_tolerance
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Texts of the best `max_results` chunks, best first.
    pub fn rank(&self, chunks: &[TextChunk], query: &str) -> Vec<String> {
        self.score_chunks(chunks, query)
            .into_iter()
            .map(|scored| scored.chunk.text)
            .collect()
    }

    /// Scores every chunk and keeps the best `max_results`. Equal scores keep
    /// document order.
    pub fn score_chunks(&self, chunks: &[TextChunk], query: &str) -> Vec<ScoredChunk> {
        let lowered = query.to_lowercase();
        let terms = extract_terms(&lowered, &self.config.stop_words);
        let query_numbers = extract_numbers(&lowered);

        let mut scored = chunks
            .iter()
            .map(|chunk| ScoredChunk {
                score: self.score(&chunk.text, &terms, &query_numbers),
                chunk: chunk.clone(),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(self.config.max_results);

        debug!(
            term_count = terms.len(),
            top_scores = ?scored.iter().take(3).map(|item| item.score).collect::<Vec<_>>(),
            "chunks ranked"
        );

        scored
    }

    fn score(&self, text: &str, terms: &[String], query_numbers: &[u64]) -> f64 {
        let lowered = text.to_lowercase();
        let mut score = 0.0;
        let mut matched_terms = 0usize;

        for term in terms {
            let occurrences = lowered.matches(term.as_str()).count();
            if occurrences > 0 {
                matched_terms += 1;
                score += occurrences as f64 * term.chars().count() as f64
                    / self.config.term_length_divisor;
            }
        }

        if !query_numbers.is_empty() {
            for chunk_number in extract_numbers(&lowered) {
                for &query_number in query_numbers {
                    let distance = chunk_number.abs_diff(query_number) as f64;
                    if distance <= query_number as f64 * self.config.number_tolerance {
                        score += self.config.number_match_bonus;
                    }
                }
            }
        }

        if matched_terms > 1 {
            score *= 1.0 + matched_terms as f64 / terms.len() as f64;
        }

        score
    }
}
