use thiserror::Error;

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Trailing fragments with less new content than this are folded into the previous chunk
pub const DEFAULT_MIN_TAIL: usize = 50;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Chunk size must be greater than zero")]
    ZeroSize,
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Estimated token count for this chunk
    pub token_count: usize,
    /// Identifier of the document this chunk belongs to
    pub document_id: String,
    /// Character offset of this chunk in the original document
    pub start_position: usize,
}

/// Sizing policy for the chunker. All sizes are counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    size: usize,
    overlap: usize,
    min_tail: usize,
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkError::OverlapTooLarge { size, overlap });
        }
        Ok(ChunkConfig {
            size,
            overlap,
            min_tail: DEFAULT_MIN_TAIL.min(size - overlap),
        })
    }

    /// Override the minimum amount of new content a trailing chunk must carry
    pub fn with_min_tail(mut self, min_tail: usize) -> Self {
        self.min_tail = min_tail;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            min_tail: DEFAULT_MIN_TAIL,
        }
    }
}

/// Split text into overlapping fixed-size chunks.
///
/// Chunks start every `size - overlap` characters and span `size` characters,
/// so neighbours share exactly `overlap` characters. The walk stops at the
/// first chunk that reaches the end of the text. If that last chunk would only
/// add a sliver of new text (fewer than `min_tail` characters past its
/// overlap), it is merged into its predecessor instead, which makes the
/// predecessor the (possibly oversized) final chunk.
pub fn split_into_chunks(text: &str, document_id: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    // Byte offset of every char, plus the end of the string, so that char
    // positions can be sliced without splitting a code point.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = boundaries.len();
    boundaries.push(text.len());

    if char_count == 0 {
        return Vec::new();
    }

    if char_count <= config.size {
        return vec![make_chunk(text, document_id, 0)];
    }

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.size).min(char_count);
        spans.push((start, end));
        if end == char_count {
            break;
        }
        start += config.step();
    }

    if spans.len() > 1 {
        let (last_start, last_end) = spans[spans.len() - 1];
        let new_content = last_end - last_start - config.overlap;
        if new_content < config.min_tail {
            spans.pop();
            if let Some(previous) = spans.last_mut() {
                previous.1 = last_end;
            }
        }
    }

    spans
        .into_iter()
        .map(|(start, end)| {
            make_chunk(
                &text[boundaries[start]..boundaries[end]],
                document_id,
                start,
            )
        })
        .collect()
}

fn make_chunk(text: &str, document_id: &str, start_position: usize) -> TextChunk {
    TextChunk {
        text: text.to_string(),
        token_count: estimate_token_count(text),
        document_id: document_id.to_string(),
        start_position,
    }
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}

#[cfg(test)]
mod tests {
    use super::*;

    // Rebuild the source text by dropping each chunk's leading overlap.
    fn reassemble(chunks: &[TextChunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_text(len: usize) -> String {
        "abcdefghijklmnopqrstuvwxyz0123456789 "
            .chars()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(ChunkConfig::new(0, 0), Err(ChunkError::ZeroSize));
        assert_eq!(
            ChunkConfig::new(10, 10),
            Err(ChunkError::OverlapTooLarge {
                size: 10,
                overlap: 10
            })
        );
        assert!(ChunkConfig::new(10, 9).is_ok());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = split_into_chunks("", "doc.pdf", &ChunkConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let config = ChunkConfig::new(100, 20).unwrap();
        for len in [1, 50, 100] {
            let text = sample_text(len);
            let chunks = split_into_chunks(&text, "doc.pdf", &config);
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].text, text);
            assert_eq!(chunks[0].start_position, 0);
        }
    }

    #[test]
    fn test_chunks_overlap_and_respect_size() {
        let config = ChunkConfig::new(10, 3).unwrap().with_min_tail(0);
        let text = sample_text(31);
        let chunks = split_into_chunks(&text, "doc.pdf", &config);

        // starts at 0, 7, 14, 21; the chunk at 21 reaches the end
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_position).collect();
        assert_eq!(starts, vec![0, 7, 14, 21]);

        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.text.chars().count(), 10);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(7).collect();
            let head: String = pair[1].text.chars().take(3).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_reassembly_reproduces_text() {
        for (size, overlap, len) in [(10, 3, 31), (50, 10, 333), (7, 0, 50), (100, 99, 250)] {
            let config = ChunkConfig::new(size, overlap).unwrap();
            let text = sample_text(len);
            let chunks = split_into_chunks(&text, "doc.pdf", &config);
            assert!(chunks.len() > 1);
            assert_eq!(reassemble(&chunks, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_small_tail_is_merged() {
        // Spans would be [0,10) [8,18) [16,20); the last adds only 2 new chars.
        let config = ChunkConfig::new(10, 2).unwrap().with_min_tail(5);
        let text = sample_text(20);
        let chunks = split_into_chunks(&text, "doc.pdf", &config);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start_position, 8);
        assert_eq!(chunks[1].text.chars().count(), 12);
        assert_eq!(reassemble(&chunks, 2), text);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let config = ChunkConfig::new(4, 1).unwrap().with_min_tail(0);
        let text = "héllo wörld ünïcode";
        let chunks = split_into_chunks(text, "doc.pdf", &config);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 4));
        assert_eq!(reassemble(&chunks, 1), text);
    }

    #[test]
    fn test_estimate_token_count() {
        assert_eq!(estimate_token_count("Hello, world!"), 4);
        assert_eq!(estimate_token_count(""), 0);
    }
}
