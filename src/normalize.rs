//! Text normalization with an offset map back to the raw text
//!
//! NFKC is applied one segment at a time (a starter plus its combining
//! marks) so diacritics compose while every emitted byte still knows which
//! raw segment produced it. Digits, identifier punctuation and case survive
//! untouched; control and zero-width characters are dropped and whitespace
//! runs collapse to one space.

use std::ops::Range;
use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

/// Normalized text plus the map back to the raw input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    /// For each byte of `text`, the raw byte range of its source segment
    source: Vec<Range<usize>>,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Map a normalized byte range back to the raw text.
    ///
    /// Returns `None` for empty or out-of-bounds ranges.
    pub fn source_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start >= end || end > self.source.len() {
            return None;
        }
        let first = self.source.get(start)?;
        let last = self.source.get(end - 1)?;
        Some(first.start..last.end)
    }
}

fn is_zero_width(ch: char) -> bool {
    matches!(
        ch,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

fn is_stripped(ch: char) -> bool {
    is_zero_width(ch) || (ch.is_control() && ch != '\n' && ch != '\t' && ch != '\r')
}

/// Split raw text into (byte range, segment) pairs, each segment being a
/// starter followed by its combining marks
fn segments(raw: &str) -> Vec<(Range<usize>, &str)> {
    let mut out = Vec::new();
    let mut seg_start: Option<usize> = None;

    for (idx, ch) in raw.char_indices() {
        let joins_previous = canonical_combining_class(ch) != 0 && seg_start.is_some();
        if !joins_previous {
            if let Some(start) = seg_start {
                out.push((start..idx, &raw[start..idx]));
            }
            seg_start = Some(idx);
        }
    }
    if let Some(start) = seg_start {
        out.push((start..raw.len(), &raw[start..]));
    }
    out
}

/// Canonicalize raw record text
pub fn normalize(raw: &str) -> NormalizedText {
    let mut text = String::with_capacity(raw.len());
    let mut source: Vec<Range<usize>> = Vec::with_capacity(raw.len());
    let mut pending_space: Option<Range<usize>> = None;

    for (range, segment) in segments(raw) {
        for ch in segment.nfkc() {
            if is_stripped(ch) {
                continue;
            }
            if ch.is_whitespace() {
                // Leading whitespace is dropped; interior runs keep their first position
                if !text.is_empty() && pending_space.is_none() {
                    pending_space = Some(range.clone());
                }
                continue;
            }
            if let Some(space_range) = pending_space.take() {
                text.push(' ');
                source.push(space_range);
            }
            let before = text.len();
            text.push(ch);
            for _ in before..text.len() {
                source.push(range.clone());
            }
        }
    }

    NormalizedText { text, source }
}

/// Largest char boundary `<= idx`
pub(crate) fn floor_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary `>= idx`
pub(crate) fn ceil_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Byte range covering `before` chars ahead of `start` and `after` chars past `end`
pub(crate) fn char_window(text: &str, start: usize, end: usize, before: usize, after: usize) -> Range<usize> {
    let lo = text[..start]
        .char_indices()
        .rev()
        .take(before)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let hi = text[end..]
        .char_indices()
        .nth(after)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    lo..hi
}
