//! Lossless chunking for the oracle's length ceiling
//!
//! Chunks are overlapping windows of at most `max_chars` characters that
//! together cover every character of the text. Consecutive chunks share
//! `overlap` characters (less when a boundary is moved to whitespace, never
//! less than half), so a name crossing one chunk's end lies whole inside the
//! next.

use std::ops::Range;

/// A window of the text sent to the oracle in one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte range in the full text
    pub range: Range<usize>,
}

impl Chunk {
    pub fn text<'a>(&self, full: &'a str) -> &'a str {
        &full[self.range.clone()]
    }

    /// Offset added to chunk-relative spans
    pub fn offset(&self) -> usize {
        self.range.start
    }
}

/// Split `text` into chunks of at most `max_chars` characters
pub fn plan_chunks(text: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char, plus the end
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let total = bounds.len() - 1;

    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars - 1);
    if total <= max_chars {
        return vec![Chunk {
            range: 0..text.len(),
        }];
    }

    let chars: Vec<char> = text.chars().collect();
    let slack = overlap / 2;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + max_chars).min(total);
        if end < total {
            // Prefer to end on whitespace, without giving up progress
            if let Some(ws) = (end.saturating_sub(slack)..end)
                .rev()
                .find(|&i| chars[i].is_whitespace())
            {
                if ws > start + overlap {
                    end = ws;
                }
            }
        }

        chunks.push(Chunk {
            range: bounds[start]..bounds[end],
        });
        if end == total {
            break;
        }

        let mut next = end - overlap;
        // Prefer to start on a word, inside the first half of the overlap
        if let Some(ws) = (next..(next + slack).min(end)).find(|&i| chars[i].is_whitespace()) {
            next = ws + 1;
        }
        start = next.max(start + 1);
    }

    tracing::debug!(chars = total, chunks = chunks.len(), "Planned oracle chunks");
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered(text: &str, chunks: &[Chunk]) -> bool {
        let mut reach = 0;
        for c in chunks {
            if c.range.start > reach {
                return false;
            }
            reach = reach.max(c.range.end);
        }
        reach == text.len()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = plan_chunks("Meu nome é Ana Souza", 1500, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].range, 0.."Meu nome é Ana Souza".len());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(plan_chunks("", 10, 2).is_empty());
    }

    #[test]
    fn test_chunks_cover_every_character() {
        let text = "palavra ".repeat(500);
        let chunks = plan_chunks(&text, 300, 40);
        assert!(chunks.len() > 1);
        assert!(covered(&text, &chunks));
        for c in &chunks {
            assert!(c.text(&text).chars().count() <= 300);
        }
    }

    #[test]
    fn test_no_whitespace_still_covers() {
        let text = "x".repeat(1001);
        let chunks = plan_chunks(&text, 100, 10);
        assert!(covered(&text, &chunks));
        assert!(chunks.iter().all(|c| c.range.len() <= 100));
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "ção ".repeat(300);
        let chunks = plan_chunks(&text, 50, 10);
        assert!(covered(&text, &chunks));
        for c in &chunks {
            assert!(text.is_char_boundary(c.range.start));
            assert!(text.is_char_boundary(c.range.end));
        }
    }

    #[test]
    fn test_name_across_boundary_is_whole_in_some_chunk() {
        let text = format!("{}Maria Aparecida Fontes {}", "a ".repeat(95), "b ".repeat(200));
        let name_start = text.find("Maria").unwrap();
        let name_end = name_start + "Maria Aparecida Fontes".len();
        let chunks = plan_chunks(&text, 200, 60);
        assert!(chunks
            .iter()
            .any(|c| c.range.start <= name_start && c.range.end >= name_end));
    }

    #[test]
    fn test_tail_is_reached() {
        let text = format!("{} Assinado: Pedro Henrique Lima", "texto ".repeat(400));
        let chunks = plan_chunks(&text, 1500, 100);
        let last = chunks.last().unwrap();
        assert!(last.text(&text).ends_with("Pedro Henrique Lima"));
    }
}
