//! Redaction geometry handed to the PDF writer.

use serde::{Deserialize, Serialize};

use super::BBox;

/// A rectangle on one page that must be covered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionBox {
    /// 0-based page index
    pub page: usize,
    /// Area to cover, before margin expansion
    pub rect: BBox,
}

impl RedactionBox {
    pub fn new(page: usize, rect: BBox) -> Self {
        Self { page, rect }
    }
}

/// Fill colour for redaction boxes, as 8-bit RGB. Serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Components scaled to the 0.0..=1.0 range used by the `rg` operator.
    pub fn to_unit(self) -> [f32; 3] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        ]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}
