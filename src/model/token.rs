//! Positioned text tokens and page-space rectangles.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in PDF user space (origin bottom-left, y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Bottom edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
}

impl BBox {
    /// Create a rectangle from two corners, normalizing their order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest rectangle containing all the given points.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = BBox::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            bbox.x0 = bbox.x0.min(x);
            bbox.y0 = bbox.y0.min(y);
            bbox.x1 = bbox.x1.max(x);
            bbox.y1 = bbox.y1.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Vertical midpoint, used for same-line comparisons.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, self.center_y())
    }

    /// Minimum bounding rectangle of `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f32) -> BBox {
        BBox {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn encloses(&self, other: &BBox) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// The overlapping part of two rectangles, `None` when they do not overlap.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BBox {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        })
    }
}

/// A word (or short run) of text with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    /// The token text, without surrounding whitespace
    pub text: String,
    /// Bounding box in page coordinates
    pub bbox: BBox,
    /// Byte offset of the first character in the page's linear text
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Index of the visual line the token was placed on
    pub line: usize,
    /// Effective font size in points
    pub font_size: f32,
}

impl PositionedToken {
    /// Whether the token's offset range intersects `[start, end)`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalizes_corners() {
        let b = BBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_bbox_union_and_expand() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 2.0, 30.0, 12.0);
        let u = a.union(&b);
        assert_eq!(u, BBox::new(0.0, 0.0, 30.0, 12.0));
        assert!(u.encloses(&a) && u.encloses(&b));

        let e = a.expand(1.5);
        assert_eq!(e, BBox::new(-1.5, -1.5, 11.5, 11.5));
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&BBox::new(5.0, 5.0, 15.0, 15.0)));
        // Touching edges do not intersect
        assert!(!a.intersects(&BBox::new(10.0, 0.0, 20.0, 10.0)));
        assert!(a.contains_point(10.0, 10.0));
    }

    #[test]
    fn test_clip_to_page() {
        let page = BBox::new(0.0, 0.0, 612.0, 792.0);
        let straddling = BBox::new(600.0, 100.0, 1.0e12, 110.0);
        assert_eq!(straddling.intersection(&page), Some(BBox::new(600.0, 100.0, 612.0, 110.0)));
        assert_eq!(BBox::new(2000.0, 0.0, 2100.0, 10.0).intersection(&page), None);
        let nan = BBox {
            x0: f32::NAN,
            y0: 0.0,
            x1: f32::NAN,
            y1: 10.0,
        };
        assert_eq!(nan.intersection(&page), None);
    }

    #[test]
    fn test_from_points() {
        let b = BBox::from_points(&[(3.0, 4.0), (-1.0, 8.0), (2.0, 0.0)]).unwrap();
        assert_eq!(b, BBox::new(-1.0, 0.0, 3.0, 8.0));
        assert!(BBox::from_points(&[]).is_none());
    }
}
