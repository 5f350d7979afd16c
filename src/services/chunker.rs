//! Text chunking with overlap for embedding.

use crate::models::{Document, DocumentChunk, IndexingConfig};

/// A contiguous slice of the source text, in character offsets `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub content: String,
    pub start: usize,
    pub end: usize,
}

/// Splits documents into overlapping chunks of bounded length.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Characters shared with the previous chunk
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &IndexingConfig) -> Self {
        Self::with_size(config.chunk_size as usize, config.chunk_overlap as usize)
    }

    /// An overlap that does not fit inside a chunk is ignored.
    pub fn with_size(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let overlap = if overlap >= chunk_size { 0 } else { overlap };
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&IndexingConfig::default())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a document, tagging every chunk with the document's id and metadata.
    pub fn chunk(&self, document: &Document) -> Vec<DocumentChunk> {
        let spans = self.split(&document.content);
        let total_chunks = spans.len() as u32;

        spans
            .into_iter()
            .enumerate()
            .map(|(idx, span)| {
                DocumentChunk::from_document(
                    document,
                    span.content,
                    idx as u32,
                    total_chunks,
                    span.start as u64,
                    span.end as u64,
                )
            })
            .collect()
    }

    /// Split text into spans of at most `chunk_size` characters.
    ///
    /// Consecutive spans share `overlap` characters unless a natural break point
    /// made the previous span too short to carry it. Nothing is dropped: removing
    /// the shared prefix of every span after the first and concatenating
    /// reproduces the input.
    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let target_end = (start + self.chunk_size).min(total_chars);
            let end = self.find_break_point(&chars, start, target_end, total_chars);

            spans.push(TextSpan {
                content: chars[start..end].iter().collect(),
                start,
                end,
            });

            if end >= total_chars {
                break;
            }

            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        spans
    }

    /// Find a natural break point in the last fifth of the window.
    ///
    /// Always returns a position in `(start, target_end]`.
    fn find_break_point(
        &self,
        chars: &[char],
        start: usize,
        target_end: usize,
        total: usize,
    ) -> usize {
        if target_end >= total {
            return total;
        }

        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + 1);
        if search_start >= target_end {
            return target_end;
        }

        // Priority: double newline > single newline > sentence end > space
        let mut paragraph = None;
        let mut last_newline = None;
        let mut last_sentence = None;
        let mut last_space = None;

        for pos in search_start..target_end {
            match chars[pos] {
                '\n' => {
                    if pos > 0 && chars[pos - 1] == '\n' {
                        paragraph = Some(pos + 1);
                    }
                    last_newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        last_sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    last_space = Some(pos + 1);
                }
                _ => {}
            }
        }

        paragraph
            .or(last_newline)
            .or(last_sentence)
            .or(last_space)
            .unwrap_or(target_end)
    }
}

/// Split `text` into chunks of at most `max_len` characters sharing `overlap`
/// characters with their predecessor.
pub fn split(text: &str, max_len: usize, overlap: usize) -> Vec<TextSpan> {
    TextChunker::with_size(max_len, overlap).split(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentFormat, DocumentKind, DocumentMetadata};

    const FRANCE: &str = "The capital of France is Paris. Paris is known for the Eiffel Tower.";

    fn create_test_document(content: &str) -> Document {
        Document::new(
            "test.txt",
            content.to_string(),
            DocumentKind::Upload,
            DocumentFormat::Txt,
            DocumentMetadata::default(),
        )
    }

    fn reconstruct(spans: &[TextSpan]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            let skip = covered - span.start;
            out.extend(span.content.chars().skip(skip));
            covered = span.end;
        }
        out
    }

    #[test]
    fn test_small_document_single_chunk() {
        let chunker = TextChunker::with_defaults();
        let doc = create_test_document("Hello, world!");
        let chunks = chunker.chunk(&doc);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].document_id, doc.id);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let chunker = TextChunker::with_defaults();
        assert!(chunker.chunk(&create_test_document("")).is_empty());
        assert!(chunker.split("   \n\t  ").is_empty());
    }

    #[test]
    fn test_capital_of_france_overlapping_chunks() {
        let spans = split(FRANCE, 40, 10);

        assert!(spans.len() >= 2);
        for span in &spans {
            assert!(span.content.chars().count() <= 40);
        }
        for pair in spans.windows(2) {
            assert!(pair[1].start < pair[0].end, "chunks must overlap");
        }
        assert!(spans.iter().any(|s| s.content.contains("Paris")));
        assert_eq!(reconstruct(&spans), FRANCE);
    }

    #[test]
    fn test_overlap_is_shared_text() {
        let text = "word ".repeat(200);
        let spans = split(&text, 60, 12);
        for pair in spans.windows(2) {
            let shared = pair[0].end - pair[1].start;
            assert_eq!(shared, 12);
            let tail: String = pair[0].content.chars().skip(pair[0].content.chars().count() - shared).collect();
            let head: String = pair[1].content.chars().take(shared).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_reconstruction_and_bounds_across_inputs() {
        let texts = [
            FRANCE.to_string(),
            "a".repeat(1234),
            "Sentence one. Sentence two! Sentence three? ".repeat(40),
            "Para one line.\n\nPara two line.\nAnother line here.\n".repeat(30),
            "Ünïcödé täxt wïth åccents and emoji 🎓 ".repeat(25),
        ];
        let params = [(40, 10), (100, 0), (500, 50), (7, 3), (64, 63)];

        for text in &texts {
            for &(max_len, overlap) in &params {
                let spans = split(text, max_len, overlap);
                assert!(!spans.is_empty());
                for span in &spans {
                    assert!(span.content.chars().count() <= max_len);
                    assert!(span.end > span.start);
                }
                assert_eq!(&reconstruct(&spans), text, "max_len={max_len} overlap={overlap}");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Deterministic chunking matters for idempotent ingestion. ".repeat(30);
        assert_eq!(split(&text, 80, 16), split(&text, 80, 16));
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_ignored() {
        let chunker = TextChunker::with_size(10, 10);
        assert_eq!(chunker.overlap(), 0);
        let spans = chunker.split(&"x".repeat(35));
        assert_eq!(spans.len(), 4);
        assert_eq!(reconstruct(&spans), "x".repeat(35));
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = format!("{} {}", "First sentence ends here.", "b".repeat(100));
        let spans = split(&text, 30, 0);
        assert_eq!(spans[0].content, "First sentence ends here.");
    }

    #[test]
    fn test_chunk_metadata_and_indices() {
        let chunker = TextChunker::with_size(50, 10);
        let doc = create_test_document(&"lorem ipsum dolor sit amet ".repeat(20));
        let chunks = chunker.chunk(&doc);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.total_chunks, chunks.len() as u32);
            assert_eq!(chunk.document_name, "test.txt");
            assert_eq!(chunk.id, DocumentChunk::generate_id(&doc.id, i as u32));
        }
    }
}
