//! Property tests for the sliding-window chunker.

use decksmith::chunker::Chunker;
use proptest::prelude::*;

fn document_lines() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,3}", 1..80)
}

proptest! {
    /// Every emitted chunk's line range stays within document bounds and
    /// start lines strictly increase.
    #[test]
    fn chunk_ranges_are_bounded_and_increasing(
        lines in document_lines(),
        chunk_size in 1usize..12,
        overlap_ratio in 0.0f32..0.9,
    ) {
        let text = lines.join("\n");
        let chunker = Chunker::new(chunk_size, overlap_ratio).unwrap();
        prop_assert!(chunker.step() >= 1);

        let chunks = chunker.chunk(&text);
        let mut previous_start = None;
        for chunk in &chunks {
            let meta = &chunk.metadata;
            prop_assert!(meta.start_line <= meta.end_line);
            prop_assert!(meta.end_line < lines.len());
            if let Some(prev) = previous_start {
                prop_assert!(meta.start_line > prev);
            }
            previous_start = Some(meta.start_line);
        }
    }

    /// Chunk indices are assigned only to emitted chunks, starting at 0.
    #[test]
    fn chunk_indices_are_dense(
        lines in document_lines(),
        chunk_size in 1usize..12,
        overlap_ratio in 0.0f32..0.9,
    ) {
        let text = lines.join("\n");
        let chunks = Chunker::new(chunk_size, overlap_ratio).unwrap().chunk(&text);
        for (position, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.metadata.index, position);
            let expected_id = format!("chunk-{position}");
            prop_assert_eq!(chunk.id.as_str(), expected_id.as_str());
        }
    }

    /// With no overlap, concatenated chunk contents reconstruct the
    /// original line sequence exactly.
    #[test]
    fn zero_overlap_reconstructs_document(
        lines in document_lines(),
        chunk_size in 1usize..12,
    ) {
        let text = lines.join("\n");
        let chunks = Chunker::new(chunk_size, 0.0).unwrap().chunk(&text);

        let reconstructed: Vec<String> = chunks
            .iter()
            .flat_map(|chunk| chunk.content.lines().map(str::to_string))
            .collect();
        prop_assert_eq!(reconstructed, lines);
    }

    /// With overlap, adjacent chunks share exactly the configured lines.
    #[test]
    fn adjacent_chunks_share_overlap(
        lines in prop::collection::vec("[a-z]{1,8}", 20..60),
        chunk_size in 4usize..10,
    ) {
        let text = lines.join("\n");
        let chunker = Chunker::new(chunk_size, 0.5).unwrap();
        let overlap = chunker.overlap();
        let chunks = chunker.chunk(&text);

        for pair in chunks.windows(2) {
            // The second chunk may be the short tail; it still begins with
            // the first chunk's trailing overlap lines.
            let first: Vec<&str> = pair[0].content.lines().collect();
            let second: Vec<&str> = pair[1].content.lines().collect();
            let shared = overlap.min(second.len());
            prop_assert_eq!(
                &first[first.len() - shared..],
                &second[..shared]
            );
        }
    }
}
