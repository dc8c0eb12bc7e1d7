//! Linear page text and its mapping back to token geometry.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{BBox, PositionedToken};

/// Monotonic map from linear-text offsets to the tokens that produced them.
///
/// Entries are sorted and non-overlapping. Offsets falling on an inserted
/// separator resolve to the token immediately before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetMap {
    entries: Vec<(usize, usize)>,
    text_len: usize,
}

impl OffsetMap {
    /// Build the map from tokens already laid out in reading order.
    pub fn from_tokens(tokens: &[PositionedToken], text_len: usize) -> Self {
        Self {
            entries: tokens.iter().map(|t| (t.start, t.end)).collect(),
            text_len,
        }
    }

    /// Number of tokens covered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an offset to the index of its owning token.
    pub fn resolve(&self, offset: usize) -> Option<usize> {
        if offset >= self.text_len || self.entries.is_empty() {
            return None;
        }
        let idx = self.entries.partition_point(|&(start, _)| start <= offset);
        Some(idx.saturating_sub(1))
    }

    /// Whether `offset` falls on an inserted separator rather than token text.
    pub fn is_separator(&self, offset: usize) -> bool {
        match self.resolve(offset) {
            Some(idx) => {
                let (start, end) = self.entries[idx];
                offset < start || offset >= end
            }
            None => false,
        }
    }

    /// Indices of the tokens whose text intersects `[start, end)`.
    pub fn tokens_in(&self, start: usize, end: usize) -> Range<usize> {
        let first = self.entries.partition_point(|&(_, e)| e <= start);
        let last = self.entries.partition_point(|&(s, _)| s < end);
        first..last.max(first)
    }
}

/// Incrementally assembles a page's linear text and token list.
#[derive(Debug, Default)]
pub struct LinearTextBuilder {
    text: String,
    tokens: Vec<PositionedToken>,
}

impl LinearTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token. A single space is inserted if the previous token was on the same line.
    pub fn push_token(&mut self, text: &str, bbox: BBox, line: usize, font_size: f32) {
        if text.is_empty() {
            return;
        }
        if let Some(prev) = self.tokens.last() {
            self.text.push(if prev.line == line { ' ' } else { '\n' });
        }
        let start = self.text.len();
        self.text.push_str(text);
        self.tokens.push(PositionedToken {
            text: text.to_string(),
            bbox,
            start,
            end: self.text.len(),
            line,
            font_size,
        });
    }

    /// Finish, returning the text, its tokens, and the offset map.
    pub fn finish(self) -> (String, Vec<PositionedToken>, OffsetMap) {
        let map = OffsetMap::from_tokens(&self.tokens, self.text.len());
        (self.text, self.tokens, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32) -> BBox {
        BBox::new(x, 0.0, x + 10.0, 10.0)
    }

    fn build() -> (String, Vec<PositionedToken>, OffsetMap) {
        let mut b = LinearTextBuilder::new();
        b.push_token("New", bbox(0.0), 0, 10.0);
        b.push_token("York", bbox(12.0), 0, 10.0);
        b.push_token("City", bbox(0.0), 1, 10.0);
        b.finish()
    }

    #[test]
    fn test_builder_separators() {
        let (text, tokens, _) = build();
        assert_eq!(text, "New York\nCity");
        assert_eq!(tokens[1].start, 4);
        assert_eq!(tokens[1].end, 8);
        assert_eq!(&text[tokens[2].start..tokens[2].end], "City");
    }

    #[test]
    fn test_resolve_every_offset() {
        let (text, _, map) = build();
        let owners: Vec<usize> = (0..text.len()).map(|o| map.resolve(o).unwrap()).collect();
        // "New York\nCity": separators resolve to the preceding token
        assert_eq!(owners, vec![0, 0, 0, 0, 1, 1, 1, 1, 1, 2, 2, 2, 2]);
        assert!(map.is_separator(3));
        assert!(map.is_separator(8));
        assert!(!map.is_separator(4));
        assert_eq!(map.resolve(text.len()), None);
    }

    #[test]
    fn test_tokens_in_range() {
        let (_, _, map) = build();
        assert_eq!(map.tokens_in(0, 8), 0..2);
        assert_eq!(map.tokens_in(4, 13), 1..3);
        // A range made only of a separator touches no token
        assert_eq!(map.tokens_in(3, 4), 1..1);
        assert!(map.tokens_in(3, 4).is_empty());
    }

    #[test]
    fn test_empty_map() {
        let map = OffsetMap::default();
        assert!(map.is_empty());
        assert_eq!(map.resolve(0), None);
        assert!(map.tokens_in(0, 5).is_empty());
    }
}
