//! Lexical retrieval index over the chunks of a single document.
//!
//! The index stores chunks verbatim in document order and answers queries
//! with a TF-IDF-style score plus multiplicative structure boosts. It is
//! built once per document and treated as immutable for the remainder of a
//! run; re-indexing replaces the whole value and [`RetrievalIndex::clear`]
//! swaps in a fresh empty instance rather than mutating fields in place.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::LazyLock;

use crate::chunker::DocumentChunk;

/// Boost applied once per (query term, header) substring match. Compounds.
const HEADER_BOOST: f64 = 1.5;
/// Boost applied once per present structural feature (image, table, code).
const STRUCTURE_BOOST: f64 = 1.1;

/// Terms dropped from queries and chunk content before scoring.
static STOP_WORDS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have",
        "if", "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "such", "that",
        "the", "their", "then", "there", "these", "they", "this", "to", "was", "were", "will",
        "with",
    ]
    .into_iter()
    .collect()
});

// ── Data model ─────────────────────────────────────────────────────────

/// Aggregate statistics captured when the index is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of chunks indexed.
    pub chunk_count: usize,
    /// Mean chunk length in characters.
    pub avg_chunk_chars: f64,
    /// Total character length across all chunks.
    pub total_chars: usize,
    /// When the index was built.
    pub created_at: DateTime<Utc>,
}

/// One search result: a borrowed chunk and its final score.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    /// The matched chunk, owned by the index.
    pub chunk: &'a DocumentChunk,
    /// TF-IDF score after structure boosts.
    pub score: f64,
}

/// The queryable aggregate over all chunks of one document.
///
/// ```rust
/// use decksmith::chunker::Chunker;
/// use decksmith::index::RetrievalIndex;
///
/// let chunks = Chunker::new(2, 0.0).unwrap().chunk("# Caching\nttl rules\nunrelated\nprose");
/// let index = RetrievalIndex::build(chunks);
/// let hits = index.search("caching ttl", 1);
/// assert_eq!(hits[0].chunk.metadata.index, 0);
/// ```
#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    chunks: Vec<DocumentChunk>,
    stats: IndexStats,
    /// Token lists per chunk, derived once at build time so repeated
    /// searches stay allocation-light and deterministic.
    tokens: Vec<Vec<String>>,
}

impl Default for RetrievalIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl RetrievalIndex {
    /// An index over zero chunks. Searches return no hits.
    #[must_use]
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// Build an index over `chunks`, preserving their order.
    #[must_use]
    pub fn build(chunks: Vec<DocumentChunk>) -> Self {
        let total_chars: usize = chunks.iter().map(|c| c.content.chars().count()).sum();
        let avg_chunk_chars = if chunks.is_empty() {
            0.0
        } else {
            total_chars as f64 / chunks.len() as f64
        };
        let tokens = chunks.iter().map(|c| tokenize(&c.content)).collect();

        Self {
            stats: IndexStats {
                chunk_count: chunks.len(),
                avg_chunk_chars,
                total_chars,
                created_at: Utc::now(),
            },
            chunks,
            tokens,
        }
    }

    /// The indexed chunks, in document order.
    #[must_use]
    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    /// Aggregate statistics captured at build time.
    #[must_use]
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Returns `true` when no chunks are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Discard all chunks and derived state, resetting to empty.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Score every chunk against `query` and return the best `top_k`,
    /// sorted by non-increasing score with ties kept in document order.
    ///
    /// Scoring: for every query term, term frequency within the chunk
    /// (occurrences ÷ chunk token count) times
    /// `ln(total_chunks / (chunks_containing_term + 1))`, summed. The sum
    /// is then multiplied by 1.5 per (term, header) substring match — this
    /// deliberately compounds across pairs — and by 1.1 each for image,
    /// table, and code presence.
    #[must_use]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit<'_>> {
        if self.chunks.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        // Document frequency per query term.
        let mut doc_freq: FxHashMap<&str, usize> = FxHashMap::default();
        for term in &query_terms {
            let df = self
                .tokens
                .iter()
                .filter(|chunk_tokens| chunk_tokens.iter().any(|t| t == term))
                .count();
            doc_freq.insert(term.as_str(), df);
        }

        let total = self.chunks.len() as f64;
        let mut hits: Vec<SearchHit<'_>> = self
            .chunks
            .iter()
            .zip(&self.tokens)
            .map(|(chunk, chunk_tokens)| {
                let mut score = 0.0f64;
                for term in &query_terms {
                    if chunk_tokens.is_empty() {
                        continue;
                    }
                    let occurrences = chunk_tokens.iter().filter(|t| *t == term).count();
                    if occurrences == 0 {
                        continue;
                    }
                    let tf = occurrences as f64 / chunk_tokens.len() as f64;
                    let df = doc_freq.get(term.as_str()).copied().unwrap_or(0);
                    let idf = (total / (df as f64 + 1.0)).ln();
                    score += tf * idf;
                }

                // Boosts compound, in this order: header matches first,
                // then image, table, code presence.
                for term in &query_terms {
                    for header in &chunk.metadata.headers {
                        if header.to_lowercase().contains(term.as_str()) {
                            score *= HEADER_BOOST;
                        }
                    }
                }
                if chunk.metadata.has_image {
                    score *= STRUCTURE_BOOST;
                }
                if chunk.metadata.has_table {
                    score *= STRUCTURE_BOOST;
                }
                if chunk.metadata.has_code {
                    score *= STRUCTURE_BOOST;
                }

                SearchHit { chunk, score }
            })
            .collect();

        // Stable sort keeps document order on equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(top_k);

        tracing::debug!(
            query_terms = query_terms.len(),
            returned = hits.len(),
            "retrieval search complete",
        );
        hits
    }
}

/// Lowercase, strip everything but alphanumerics (Unicode-aware), split on
/// whitespace, and drop stop words. Queries and chunk content go through
/// the same path so scores line up.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    normalized
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────────
