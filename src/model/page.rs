//! Page-level types.

use serde::Serialize;

use super::{BBox, LinearTextBuilder, OffsetMap, PositionedToken};

/// A single page with its positioned tokens and linear text.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Page index (0-based)
    pub index: usize,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// The page's MediaBox in user space
    pub media_box: BBox,

    /// Tokens in reading order
    tokens: Vec<PositionedToken>,

    /// Reading-order text: tokens joined by single spaces and newlines
    text: String,

    #[serde(skip)]
    offsets: OffsetMap,
}

impl Page {
    /// Create an empty page with the given MediaBox.
    pub fn new(index: usize, media_box: BBox) -> Self {
        Self {
            index,
            width: media_box.width(),
            height: media_box.height(),
            media_box,
            tokens: Vec::new(),
            text: String::new(),
            offsets: OffsetMap::default(),
        }
    }

    /// Create a page with standard Letter size (8.5 x 11 inches).
    pub fn letter(index: usize) -> Self {
        Self::new(index, BBox::new(0.0, 0.0, 612.0, 792.0))
    }

    /// Attach the text layout produced by a [`LinearTextBuilder`].
    pub fn with_layout(mut self, builder: LinearTextBuilder) -> Self {
        let (text, tokens, offsets) = builder.finish();
        self.text = text;
        self.tokens = tokens;
        self.offsets = offsets;
        self
    }

    /// The page's linear text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[PositionedToken] {
        &self.tokens
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    /// Token owning the character at `offset`; separators map to the preceding token.
    pub fn token_at(&self, offset: usize) -> Option<&PositionedToken> {
        self.offsets.resolve(offset).and_then(|i| self.tokens.get(i))
    }

    /// Tokens whose text intersects `[start, end)`, in reading order.
    pub fn tokens_in(&self, start: usize, end: usize) -> &[PositionedToken] {
        let range = self.offsets.tokens_in(start, end);
        self.tokens.get(range).unwrap_or(&[])
    }

    /// Whether the page has no extractable text.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of visual lines on the page.
    pub fn line_count(&self) -> usize {
        self.tokens.last().map(|t| t.line + 1).unwrap_or(0)
    }

    /// Check that tokens reproduce the linear text exactly.
    ///
    /// Every token's text must equal its slice, and the gap between two
    /// consecutive tokens must be a single separator.
    pub fn verify_offsets(&self) -> bool {
        let mut rebuilt = String::with_capacity(self.text.len());
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                match self.text.get(rebuilt.len()..token.start) {
                    Some(" ") | Some("\n") => rebuilt.push_str(&self.text[rebuilt.len()..token.start]),
                    _ => return false,
                }
            }
            if token.start != rebuilt.len() {
                return false;
            }
            rebuilt.push_str(&token.text);
            if token.end != rebuilt.len() {
                return false;
            }
        }
        rebuilt == self.text
    }

    /// Get page dimensions as (width, height) tuple.
    pub fn dimensions(&self) -> (f32, f32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Page {
        let mut b = LinearTextBuilder::new();
        b.push_token("Contact", BBox::new(72.0, 700.0, 122.0, 712.0), 0, 12.0);
        b.push_token("John", BBox::new(130.0, 700.0, 158.0, 712.0), 0, 12.0);
        b.push_token("Tan", BBox::new(72.0, 686.0, 93.0, 698.0), 1, 12.0);
        Page::letter(0).with_layout(b)
    }

    #[test]
    fn test_page_new() {
        let page = Page::letter(0);
        assert_eq!(page.index, 0);
        assert_eq!(page.dimensions(), (612.0, 792.0));
        assert!(page.is_empty());
        assert_eq!(page.line_count(), 0);
        assert!(page.verify_offsets());
    }

    #[test]
    fn test_page_layout_round_trip() {
        let page = sample_page();
        assert_eq!(page.text(), "Contact John\nTan");
        assert_eq!(page.line_count(), 2);
        assert!(page.verify_offsets());
    }

    #[test]
    fn test_token_lookup() {
        let page = sample_page();
        assert_eq!(page.token_at(8).unwrap().text, "John");
        // The newline resolves to the token before it
        assert_eq!(page.token_at(12).unwrap().text, "John");
        let hits: Vec<&str> = page.tokens_in(8, 16).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(hits, vec!["John", "Tan"]);
    }
}
