use crate::error::SearchError;
use crate::models::TextChunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Soft character limit of a chunk.
    pub target_size: usize,
    /// Character overlap budget between consecutive chunks.
    pub overlap: usize,
    /// Characters per word assumed when turning `overlap` into a word count.
    pub overlap_word_divisor: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: 250,
            overlap: 80,
            overlap_word_divisor: 5,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.target_size == 0 {
            return Err(SearchError::InvalidConfig(
                "chunk target_size must be positive".to_string(),
            ));
        }
        if self.overlap_word_divisor == 0 {
            return Err(SearchError::InvalidConfig(
                "overlap_word_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn overlap_words(&self) -> usize {
        self.overlap / self.overlap_word_divisor.max(1)
    }
}

/// Greedy line packing: lines are joined with `\n` while the chunk stays
/// within `target_size` characters. A closed chunk seeds the next one with
/// its trailing `overlap_words()` words.
pub fn chunk_document(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let overlap_words = config.overlap_words();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let line_chars = line.chars().count();

        if current_chars + line_chars > config.target_size {
            if current.is_empty() {
                current.push_str(line);
            } else {
                let seed = trailing_words(&current, overlap_words);
                chunks.push(TextChunk {
                    index: chunks.len(),
                    text: std::mem::take(&mut current),
                });
                if !seed.is_empty() {
                    current.push_str(&seed);
                    current.push(' ');
                }
                current.push_str(line);
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }

        current_chars = current.chars().count();
    }

    if !current.is_empty() {
        chunks.push(TextChunk {
            index: chunks.len(),
            text: current,
        });
    }

    chunks
}

fn trailing_words(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let words = text.split_whitespace().collect::<Vec<_>>();
    words[words.len().saturating_sub(count)..].join(" ")
}

/// Document fingerprint used as the cache key.
pub fn document_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Process-wide memo of chunk sequences per document snapshot. Stored
/// sequences are immutable and shared.
#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: Mutex<HashMap<(String, ChunkingConfig), Arc<[TextChunk]>>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks_for(&self, text: &str, config: &ChunkingConfig) -> Arc<[TextChunk]> {
        let key = (document_digest(text), *config);

        if let Some(cached) = self.lock().get(&key) {
            return Arc::clone(cached);
        }

        let chunks: Arc<[TextChunk]> = chunk_document(text, config).into();
        debug!(chunk_count = chunks.len(), digest = %key.0, "document chunked");
        self.lock().entry(key).or_insert(chunks).clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, ChunkingConfig), Arc<[TextChunk]>>> {
        // Entries are immutable once inserted, so a poisoned map is still usable.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }

    #[test]
    fn single_line_of_target_size_is_one_chunk() {
        let line = "x".repeat(250);
        let chunks = chunk_document(&line, &ChunkingConfig::default());
        assert_eq!(texts(&chunks), vec![line.as_str()]);
    }

    #[test]
    fn blank_lines_are_dropped_and_short_lines_joined() {
        let chunks = chunk_document("uno\n\n   \ndos\ntres\n", &ChunkingConfig::default());
        assert_eq!(texts(&chunks), vec!["uno\ndos\ntres"]);
    }

    #[test]
    fn closed_chunk_seeds_the_next_with_trailing_words() {
        let config = ChunkingConfig {
            target_size: 20,
            overlap: 10,
            overlap_word_divisor: 5,
        };
        let text = "alfa beta gama delta\nepsilon zeta\neta theta iota";
        let chunks = chunk_document(text, &config);

        assert_eq!(
            texts(&chunks),
            vec![
                "alfa beta gama delta",
                "gama delta epsilon zeta",
                "epsilon zeta eta theta iota"
            ]
        );
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn oversized_first_line_is_kept_whole() {
        let config = ChunkingConfig {
            target_size: 5,
            overlap: 0,
            overlap_word_divisor: 5,
        };
        let chunks = chunk_document("una línea larga\ncorta", &config);
        assert_eq!(texts(&chunks), vec!["una línea larga", "corta"]);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = (0..40)
            .map(|index| format!("Producto {index}: monitor de 24 pulgadas a {} soles", index * 50))
            .collect::<Vec<_>>()
            .join("\n");
        let config = ChunkingConfig::default();
        assert_eq!(chunk_document(&text, &config), chunk_document(&text, &config));
        assert!(chunk_document(&text, &config).len() > 1);
    }

    #[test]
    fn cache_reuses_chunks_for_the_same_snapshot() {
        let cache = ChunkCache::new();
        let config = ChunkingConfig::default();

        let first = cache.chunks_for("linea uno\nlinea dos", &config);
        let second = cache.chunks_for("linea uno\nlinea dos", &config);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.chunks_for("otro documento", &config);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_divisor_is_rejected() {
        let config = ChunkingConfig {
            overlap_word_divisor: 0,
            ..ChunkingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
