//! Fixed-size overlapping text splitter.
//!
//! Splitting is a deterministic, pure function of its inputs: the same text
//! and settings always yield the same chunks, so re-ingesting a document
//! reproduces its vector collection exactly.

use crate::types::{Chunk, RagError};

/// Splits document text into overlapping spans measured in characters.
///
/// Adjacent chunks share `overlap` characters of boundary context so that a
/// sentence straddling a cut still appears whole in one of its neighbors.
/// Trailing partial content is never dropped.
#[derive(Clone, Copy, Debug)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Creates a chunker, rejecting degenerate settings before any use.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::InvalidInput("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(RagError::InvalidInput(
                "overlap must be smaller than chunk_size".into(),
            ));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into ordered chunks tagged with the owning document id.
    ///
    /// Text shorter than `chunk_size` yields exactly one chunk; empty text
    /// yields none. Boundaries land on char boundaries, never mid-codepoint.
    pub fn split(&self, text: &str, source_document_id: &str) -> Vec<Chunk> {
        // Byte offset of every char boundary, so slicing stays valid UTF-8.
        let boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        let char_count = boundaries.len();
        if char_count == 0 {
            return Vec::new();
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(char_count);
            let byte_start = boundaries[start];
            let byte_end = if end == char_count {
                text.len()
            } else {
                boundaries[end]
            };
            chunks.push(Chunk {
                text: text[byte_start..byte_end].to_string(),
                source_document_id: source_document_id.to_string(),
            });
            if end == char_count {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(Chunker::new(0, 0).is_err());
    }

    #[test]
    fn rejects_overlap_at_or_above_chunk_size() {
        assert!(Chunker::new(10, 10).is_err());
        assert!(Chunker::new(10, 15).is_err());
        assert!(Chunker::new(10, 9).is_ok());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunker = Chunker::new(100, 20).unwrap();
        let chunks = chunker.split("short text", "d1");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].source_document_id, "d1");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = Chunker::new(100, 20).unwrap();
        assert!(chunker.split("", "d1").is_empty());
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let chunker = Chunker::new(10, 4).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.split(text, "d1");

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].text.chars().rev().take(4).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(pair[1].text.starts_with(&prev_tail));
        }
    }

    #[test]
    fn trailing_content_is_never_dropped() {
        let chunker = Chunker::new(10, 2).unwrap();
        let text = "abcdefghijklmnopqrstu";
        let chunks = chunker.split(text, "d1");
        let last = chunks.last().unwrap();
        assert!(text.ends_with(last.text.as_str()));
        assert!(last.text.ends_with('u'));
    }

    #[test]
    fn splitting_is_deterministic() {
        let chunker = Chunker::new(12, 3).unwrap();
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(chunker.split(text, "d1"), chunker.split(text, "d1"));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let chunker = Chunker::new(4, 1).unwrap();
        let text = "héllö wörld ünïcodé";
        let chunks = chunker.split(text, "d1");
        let reassembled: String = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                if i == 0 {
                    chunk.text.clone()
                } else {
                    chunk.text.chars().skip(1).collect()
                }
            })
            .collect();
        assert_eq!(reassembled, text);
    }
}
