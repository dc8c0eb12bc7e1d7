//! Mapping text spans back to page rectangles.

use crate::model::{BBox, Page, PositionedToken, RedactionBox, ReconciledSpan};

/// Boxes produced for one page, plus the spans that could not be placed.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    pub boxes: Vec<RedactionBox>,
    pub unmapped: Vec<ReconciledSpan>,
}

/// Turns reconciled spans into one rectangle per visual line they cover.
#[derive(Debug, Clone, Copy)]
pub struct GeometryMapper {
    line_band_tolerance: f32,
}

impl Default for GeometryMapper {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl GeometryMapper {
    pub fn new(line_band_tolerance: f32) -> Self {
        Self {
            line_band_tolerance: line_band_tolerance.max(0.0),
        }
    }

    /// Rectangles covering `span`: the union of its tokens, split per line band.
    ///
    /// Consecutive tokens whose vertical centres differ by more than the
    /// tolerance, or that jump back to the left, start a new rectangle.
    /// Returns nothing when no token intersects the span.
    pub fn map_span(&self, page: &Page, span: &ReconciledSpan) -> Vec<RedactionBox> {
        let tokens = page.tokens_in(span.start, span.end);
        self.group(tokens)
            .into_iter()
            .map(|rect| RedactionBox::new(page.index, rect))
            .collect()
    }

    /// Map every span on a page. Spans without tokens are logged and collected.
    pub fn map_page(&self, page: &Page, spans: &[ReconciledSpan]) -> PageGeometry {
        let mut geometry = PageGeometry::default();
        for span in spans {
            let boxes = self.map_span(page, span);
            if boxes.is_empty() {
                log::warn!(
                    "Unmapped {} span at {}..{} on page {}; no tokens resolved",
                    span.category,
                    span.start,
                    span.end,
                    page.index
                );
                geometry.unmapped.push(span.clone());
            } else {
                geometry.boxes.extend(boxes);
            }
        }
        geometry
    }

    fn group(&self, tokens: &[PositionedToken]) -> Vec<BBox> {
        let mut rects: Vec<BBox> = Vec::new();
        let mut previous: Option<&PositionedToken> = None;
        for token in tokens {
            let continues = previous.is_some_and(|prev| {
                (token.bbox.center_y() - prev.bbox.center_y()).abs() <= self.line_band_tolerance
                    && token.bbox.x0 >= prev.bbox.x0
            });
            match rects.last_mut() {
                Some(rect) if continues => *rect = rect.union(&token.bbox),
                _ => rects.push(token.bbox),
            }
            previous = Some(token);
        }
        rects
    }
}
