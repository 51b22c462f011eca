//! Sliding-window document chunking with structural metadata extraction.
//!
//! The chunker splits a raw document into overlapping windows of lines and
//! tags every emitted chunk with the structure it observed: ATX headers,
//! fenced code blocks, pipe-delimited table rows, and image references.
//! Chunks are immutable after creation and are owned by the
//! [`RetrievalIndex`](crate::index::RetrievalIndex) built over them.

use miette::Diagnostic;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("header pattern is valid"));
static TABLE_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|.*\|").expect("table pattern is valid"));
static IMAGE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image pattern is valid"));

// ── Data model ─────────────────────────────────────────────────────────

/// Structural metadata extracted from one chunk's lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Positional index among emitted chunks, strictly increasing from 0.
    pub index: usize,
    /// First document line covered by this chunk (0-based, inclusive).
    pub start_line: usize,
    /// Last document line covered by this chunk (0-based, inclusive).
    pub end_line: usize,
    /// Header texts found in the chunk, marker stripped.
    pub headers: Vec<String>,
    /// Whether the chunk contains a fenced code block marker.
    pub has_code: bool,
    /// Whether the chunk contains a pipe-delimited table row.
    pub has_table: bool,
    /// Whether the chunk contains a markdown image reference.
    pub has_image: bool,
}

/// A contiguous, possibly overlapping span of document lines.
///
/// The `embedding` slot is reserved for future semantic retrieval and is
/// never populated by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable per-position identifier, e.g. `chunk-3`.
    pub id: String,
    /// The chunk's text, lines joined with `\n`.
    pub content: String,
    /// Extracted structural metadata.
    pub metadata: ChunkMetadata,
    /// Reserved numeric embedding, unused by the lexical index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Errors raised while validating a chunking request.
#[derive(Debug, Error, Diagnostic)]
pub enum ChunkError {
    /// The window size is zero.
    #[error("chunk size must be at least 1 line")]
    #[diagnostic(code(decksmith::chunker::zero_window))]
    ZeroWindow,

    /// The overlap ratio leaves no forward progress.
    #[error("overlap ratio {ratio} is outside [0.0, 1.0)")]
    #[diagnostic(
        code(decksmith::chunker::bad_overlap),
        help("An overlap ratio of 1.0 or more would stall the sliding window.")
    )]
    BadOverlap { ratio: f32 },
}

// ── Chunker ────────────────────────────────────────────────────────────

/// Splits raw text into overlapping, metadata-tagged chunks.
///
/// ```rust
/// use decksmith::chunker::Chunker;
///
/// let chunker = Chunker::new(2, 0.0).unwrap();
/// let chunks = chunker.chunk("# Title\nbody\nmore");
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].metadata.headers, vec!["Title"]);
/// ```
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    step: usize,
}

impl Chunker {
    /// Create a chunker over windows of `chunk_size` lines, adjacent windows
    /// sharing `floor(chunk_size * overlap_ratio)` lines.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::ZeroWindow`] for `chunk_size == 0` and
    /// [`ChunkError::BadOverlap`] for ratios outside `[0.0, 1.0)`.
    pub fn new(chunk_size: usize, overlap_ratio: f32) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroWindow);
        }
        if !(0.0..1.0).contains(&overlap_ratio) {
            return Err(ChunkError::BadOverlap {
                ratio: overlap_ratio,
            });
        }

        let overlap = (chunk_size as f32 * overlap_ratio).floor() as usize;
        // The ratio guard already forces overlap < chunk_size; the max(1)
        // clamp keeps the window moving even if that invariant ever breaks.
        let step = (chunk_size - overlap).max(1);

        Ok(Self {
            chunk_size,
            overlap,
            step,
        })
    }

    /// Number of lines shared between adjacent windows.
    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lines the window advances per iteration.
    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Split `text` into ordered chunks.
    ///
    /// Windows whose trimmed content is empty are skipped without consuming
    /// a chunk index. An empty document yields no chunks; the final chunk
    /// may be shorter than the window size.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<DocumentChunk> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < lines.len() {
            let end = (start + self.chunk_size).min(lines.len());
            let window = &lines[start..end];
            let content = window.join("\n");

            if !content.trim().is_empty() {
                let metadata = extract_metadata(index, start, end - 1, window);
                chunks.push(DocumentChunk {
                    id: format!("chunk-{index}"),
                    content,
                    metadata,
                    embedding: None,
                });
                index += 1;
            }

            // A window that reached the document end covers everything the
            // next one would; stop instead of emitting an overlap-only tail.
            if end == lines.len() {
                break;
            }
            start += self.step;
        }

        tracing::debug!(
            chunks = chunks.len(),
            lines = lines.len(),
            window = self.chunk_size,
            overlap = self.overlap,
            "document chunked",
        );
        chunks
    }
}

fn extract_metadata(index: usize, start_line: usize, end_line: usize, lines: &[&str]) -> ChunkMetadata {
    let mut headers = Vec::new();
    let mut has_code = false;
    let mut has_table = false;
    let mut has_image = false;

    for line in lines {
        if let Some(caps) = HEADER_RE.captures(line) {
            headers.push(caps[2].trim().to_string());
        }
        if line.trim_start().starts_with("```") {
            has_code = true;
        }
        if TABLE_ROW_RE.is_match(line) {
            has_table = true;
        }
        if IMAGE_REF_RE.is_match(line) {
            has_image = true;
        }
    }

    ChunkMetadata {
        index,
        start_line,
        end_line,
        headers,
        has_code,
        has_table,
        has_image,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(n: usize) -> String {
        (0..n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunker = Chunker::new(10, 0.0).unwrap();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn exact_window_yields_single_chunk() {
        let chunker = Chunker::new(10, 0.0).unwrap();
        let chunks = chunker.chunk(&numbered_lines(10));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.index, 0);
        assert_eq!(chunks[0].id, "chunk-0");
        assert_eq!(chunks[0].metadata.start_line, 0);
        assert_eq!(chunks[0].metadata.end_line, 9);
    }

    #[test]
    fn overlapping_windows_share_trailing_lines() {
        // 2 * chunk_size - overlap lines produce exactly 2 chunks whose
        // shared region is identical text.
        let chunk_size = 10;
        let chunker = Chunker::new(chunk_size, 0.2).unwrap();
        let overlap = chunker.overlap();
        assert_eq!(overlap, 2);

        let chunks = chunker.chunk(&numbered_lines(2 * chunk_size - overlap));
        assert_eq!(chunks.len(), 2);

        let first_tail: Vec<&str> = chunks[0]
            .content
            .lines()
            .skip(chunk_size - overlap)
            .collect();
        let second_head: Vec<&str> = chunks[1].content.lines().take(overlap).collect();
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn final_chunk_may_be_short() {
        let chunker = Chunker::new(10, 0.0).unwrap();
        let chunks = chunker.chunk(&numbered_lines(13));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content.lines().count(), 3);
        assert_eq!(chunks[1].metadata.end_line, 12);
    }

    #[test]
    fn blank_windows_are_skipped_without_consuming_indices() {
        let chunker = Chunker::new(2, 0.0).unwrap();
        let chunks = chunker.chunk("alpha\nbeta\n\n\ngamma");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.index, 0);
        assert_eq!(chunks[1].metadata.index, 1);
        assert_eq!(chunks[1].id, "chunk-1");
        assert_eq!(chunks[1].content, "gamma");
    }

    #[test]
    fn structural_metadata_is_extracted() {
        let text = "\
## Background
Some prose.
```rust
fn main() {}
```
| a | b |
![diagram](fig.png)";
        let chunker = Chunker::new(10, 0.0).unwrap();
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 1);
        let meta = &chunks[0].metadata;
        assert_eq!(meta.headers, vec!["Background"]);
        assert!(meta.has_code);
        assert!(meta.has_table);
        assert!(meta.has_image);
    }

    #[test]
    fn seven_hashes_is_not_a_header() {
        let chunker = Chunker::new(5, 0.0).unwrap();
        let chunks = chunker.chunk("####### not a header");
        assert!(chunks[0].metadata.headers.is_empty());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(matches!(Chunker::new(0, 0.0), Err(ChunkError::ZeroWindow)));
        assert!(matches!(
            Chunker::new(10, 1.0),
            Err(ChunkError::BadOverlap { .. })
        ));
        assert!(matches!(
            Chunker::new(10, -0.1),
            Err(ChunkError::BadOverlap { .. })
        ));
    }

    #[test]
    fn start_lines_strictly_increase() {
        let chunker = Chunker::new(8, 0.5).unwrap();
        let chunks = chunker.chunk(&numbered_lines(50));
        for pair in chunks.windows(2) {
            assert!(pair[0].metadata.start_line < pair[1].metadata.start_line);
        }
    }
}
