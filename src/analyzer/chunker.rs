use crate::text::char_len;

/// Share of `max_chunk_size` a sentence boundary must reach to be used as
/// the cut point.
const MIN_BOUNDARY_RATIO: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub position: usize,
    /// Char offset of this chunk in the full text.
    pub offset: usize,
}

impl Chunk {
    #[must_use]
    pub fn len(&self) -> usize {
        char_len(&self.content)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Splits text into contiguous chunks of at most `chunk_size` chars, cutting
/// after `.`, `?` or `!` when such a boundary lies far enough into the chunk.
///
/// Nothing is trimmed: concatenating the chunks yields `text` again, so
/// chunk offsets can be used to rebase issue spans.
pub fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= chunk_size {
        return vec![Chunk {
            content: text.to_string(),
            position: 0,
            offset: 0,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while chars.len() - start > chunk_size {
        let limit = start + chunk_size;
        let mut cut_point = limit;

        // Search backwards from the limit for the nearest sentence boundary
        for i in (start..limit).rev() {
            if matches!(chars[i], '.' | '?' | '!') {
                if (i + 1 - start) as f64 >= chunk_size as f64 * MIN_BOUNDARY_RATIO {
                    cut_point = i + 1;
                }
                break;
            }
        }

        chunks.push(Chunk {
            content: chars[start..cut_point].iter().collect(),
            position: chunks.len(),
            offset: start,
        });
        start = cut_point;
    }

    if start < chars.len() {
        chunks.push(Chunk {
            content: chars[start..].iter().collect(),
            position: chunks.len(),
            offset: start,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejoin(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    #[test]
    fn test_split_short_text() {
        let chunks = split_into_chunks("One sentence. Two sentences.", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_split_empty_text() {
        let chunks = split_into_chunks("", 1000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn test_cuts_at_sentence_boundary() {
        // 20-char sentences; boundary at 80 of 100 is past 70%
        let text = "This is sentence ab. ".repeat(10);
        let chunks = split_into_chunks(&text, 100);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].content.ends_with('.'));
        assert!(chunks[0].len() >= 70 && chunks[0].len() <= 100);
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_hard_cut_when_boundary_too_early() {
        let text = format!("Short. {}", "x".repeat(200));
        let chunks = split_into_chunks(&text, 100);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_offsets_are_cumulative() {
        let text = "Alpha beta gamma. ".repeat(150);
        let chunks = split_into_chunks(&text, 1000);
        let mut expected = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, i);
            assert_eq!(chunk.offset, expected);
            assert!(chunk.len() <= 1000);
            expected += chunk.len();
        }
        assert_eq!(expected, char_len(&text));
    }

    #[test]
    fn test_split_japanese() {
        let text = "これは日本語のテストです!".repeat(100);
        let chunks = split_into_chunks(&text, 500);
        assert!(chunks.len() >= 2);
        assert_eq!(rejoin(&chunks), text);
        assert!(chunks[0].content.ends_with('!'));
    }
}
