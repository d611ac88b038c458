//! Text chunking for downstream search and retrieval.
//!
//! Fixed-size windows with overlap; the cut point backs off to the last
//! sentence boundary inside the window so chunks do not split mid-sentence.
//! Chunks below the minimum are merged into their predecessor.

/// One chunk of document text, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    pub content: String,
    pub chunk_index: usize,
    pub char_offset: usize,
}

pub struct DocumentChunker {
    max_chunk_chars: usize,
    min_chunk_chars: usize,
    overlap_chars: usize,
}

impl DocumentChunker {
    pub fn new() -> Self {
        Self {
            max_chunk_chars: 1000,
            min_chunk_chars: 50,
            overlap_chars: 100,
        }
    }

    #[cfg(test)]
    fn with_limits(max: usize, min: usize, overlap: usize) -> Self {
        Self {
            max_chunk_chars: max,
            min_chunk_chars: min,
            overlap_chars: overlap,
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vec![];
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let hard_end = (start + self.max_chunk_chars).min(chars.len());
            let end = if hard_end < chars.len() {
                sentence_boundary(&chars, start, hard_end).unwrap_or(hard_end)
            } else {
                hard_end
            };

            let content: String = chars[start..end].iter().collect();
            let content = content.trim();
            if !content.is_empty() {
                chunks.push(ChunkSpan {
                    content: content.to_string(),
                    chunk_index: chunks.len(),
                    char_offset: start,
                });
            }

            if end >= chars.len() {
                break;
            }
            start = end.saturating_sub(self.overlap_chars).max(start + 1);
        }

        merge_tiny_chunks(&mut chunks, self.min_chunk_chars);
        chunks
    }
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Index just after the last sentence end inside `[start, hard_end)`.
/// Returns None when no boundary lands in the back half of the window,
/// which would produce degenerate short chunks.
fn sentence_boundary(chars: &[char], start: usize, hard_end: usize) -> Option<usize> {
    let floor = start + (hard_end - start) / 2;
    for i in (floor..hard_end).rev() {
        if matches!(chars[i], '.' | '!' | '?' | '\n') {
            return Some(i + 1);
        }
    }
    None
}

fn merge_tiny_chunks(chunks: &mut Vec<ChunkSpan>, min_chars: usize) {
    let mut i = 0;
    while i < chunks.len() {
        if chunks[i].content.chars().count() < min_chars && chunks.len() > 1 {
            let tiny = chunks.remove(i);
            let target = if i > 0 { i - 1 } else { 0 };
            chunks[target].content.push('\n');
            chunks[target].content.push_str(&tiny.content);
        } else {
            i += 1;
        }
    }
    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.chunk_index = index;
    }
}
