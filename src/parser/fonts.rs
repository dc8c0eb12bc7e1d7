//! Font metrics and per-code decoding.
//!
//! Glyph geometry needs widths and vertical extents, and the redactor needs to
//! know exactly which bytes of a show-string belong to which glyph. Both come
//! from here so extraction and rewriting always agree.

use std::collections::HashMap;
use std::ops::Range;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

/// Decoder turning one character code into Unicode text.
pub type CodeDecoder<'a> = Box<dyn Fn(&[u8]) -> Option<String> + 'a>;

/// Fonts available on one page, keyed by resource name.
pub type PageFonts<'a> = HashMap<Vec<u8>, PageFont<'a>>;

/// Width and vertical extent information, all in glyph units (1/1000 em).
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// Bytes per character code (1 for simple fonts, 2 for Type0)
    pub code_len: usize,
    pub first_char: u32,
    pub widths: Vec<f32>,
    /// Sparse widths from a CID font's /W array
    pub cid_widths: HashMap<u32, f32>,
    /// Width for codes not covered above
    pub default_width: f32,
    pub ascent: f32,
    pub descent: f32,
}

impl FontMetrics {
    /// Metrics for a one-byte font where every glyph has the same width.
    pub fn monospace(width: f32) -> Self {
        Self {
            code_len: 1,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: width,
            ascent: 800.0,
            descent: -200.0,
        }
    }

    /// Estimated metrics for a font without width information.
    pub fn estimate(base_font: &str) -> Self {
        if base_font.contains("Courier") {
            Self::monospace(600.0)
        } else {
            Self::monospace(500.0)
        }
    }

    /// Advance width of `code` in glyph units.
    pub fn width(&self, code: u32) -> f32 {
        if let Some(w) = self.cid_widths.get(&code) {
            return *w;
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::monospace(500.0)
    }
}

/// A font resource resolved for one page.
pub struct PageFont<'a> {
    pub base_font: String,
    pub metrics: FontMetrics,
    decoder: Option<CodeDecoder<'a>>,
}

impl<'a> PageFont<'a> {
    pub fn new(base_font: impl Into<String>, metrics: FontMetrics) -> Self {
        Self {
            base_font: base_font.into(),
            metrics,
            decoder: None,
        }
    }

    /// Attach a decoder backed by the font's encoding or ToUnicode map.
    pub fn with_decoder(mut self, decoder: CodeDecoder<'a>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Split a show-string into character codes with their byte ranges.
    ///
    /// A trailing partial code in a two-byte font is dropped.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(Range<usize>, u32)> {
        let len = self.metrics.code_len.max(1);
        bytes
            .chunks_exact(len)
            .enumerate()
            .map(|(i, chunk)| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                (i * len..(i + 1) * len, code)
            })
            .collect()
    }

    /// Unicode text for a single code.
    pub fn decode(&self, code: &[u8]) -> String {
        if let Some(text) = self.decoder.as_ref().and_then(|d| d(code)) {
            if !text.is_empty() && !text.contains('\u{fffd}') {
                return text;
            }
        }
        match code {
            [b] => (*b as char).to_string(),
            [hi, lo] => char::from_u32(u16::from_be_bytes([*hi, *lo]) as u32)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

impl std::fmt::Debug for PageFont<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFont")
            .field("base_font", &self.base_font)
            .field("metrics", &self.metrics)
            .field("has_decoder", &self.decoder.is_some())
            .finish()
    }
}

/// Resolve a font dictionary into metrics plus a decoder.
pub(crate) fn load_font<'a>(doc: &'a LopdfDocument, font: &'a Dictionary) -> PageFont<'a> {
    let base_font = font
        .get(b"BaseFont")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let metrics = if name_of(font, b"Subtype") == Some(b"Type0".as_slice()) {
        composite_metrics(doc, font)
    } else {
        simple_metrics(doc, font, &base_font)
    };

    let page_font = PageFont::new(base_font, metrics);
    match font.get_font_encoding(doc) {
        Ok(encoding) => page_font.with_decoder(Box::new(move |bytes: &[u8]| {
            LopdfDocument::decode_text(&encoding, bytes).ok()
        })),
        Err(e) => {
            log::debug!("No usable encoding for {}: {}", page_font.base_font, e);
            page_font
        }
    }
}

/// Fonts named in a /Resources dictionary.
pub(crate) fn load_fonts<'a>(doc: &'a LopdfDocument, resources: &'a Dictionary) -> PageFonts<'a> {
    let Some(fonts) = dict_entry(doc, resources, b"Font") else {
        return PageFonts::new();
    };
    fonts
        .iter()
        .filter_map(|(name, obj)| {
            let dict = resolve(doc, obj).as_dict().ok()?;
            Some((name.clone(), load_font(doc, dict)))
        })
        .collect()
}

fn simple_metrics(doc: &LopdfDocument, font: &Dictionary, base_font: &str) -> FontMetrics {
    let descriptor = dict_entry(doc, font, b"FontDescriptor");
    let widths: Vec<f32> = dict_entry_obj(doc, font, b"Widths")
        .and_then(|o| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|o| number(resolve(doc, o)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();

    let mut metrics = FontMetrics::estimate(base_font);
    if widths.is_empty() {
        log::debug!("No /Widths for {}; using estimated metrics", base_font);
    } else {
        metrics.first_char = dict_entry_obj(doc, font, b"FirstChar")
            .and_then(number)
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(0);
        metrics.widths = widths;
        if let Some(missing) = descriptor
            .and_then(|d| dict_entry_obj(doc, d, b"MissingWidth"))
            .and_then(number)
            .filter(|w| *w > 0.0)
        {
            metrics.default_width = missing;
        }
    }
    apply_descriptor(doc, descriptor, &mut metrics);
    metrics
}

fn composite_metrics(doc: &LopdfDocument, font: &Dictionary) -> FontMetrics {
    let descendant = dict_entry_obj(doc, font, b"DescendantFonts")
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|o| resolve(doc, o).as_dict().ok());

    let mut metrics = FontMetrics::monospace(1000.0);
    metrics.code_len = 2;
    if let Some(cid_font) = descendant {
        if let Some(dw) = dict_entry_obj(doc, cid_font, b"DW").and_then(number) {
            metrics.default_width = dw;
        }
        if let Some(w) = dict_entry_obj(doc, cid_font, b"W").and_then(|o| o.as_array().ok()) {
            metrics.cid_widths = parse_cid_widths(doc, w);
        }
        apply_descriptor(doc, dict_entry(doc, cid_font, b"FontDescriptor"), &mut metrics);
    }
    metrics
}

/// Parse a CID font /W array: `c [w1 w2 ...]` and `c_first c_last w` entries.
fn parse_cid_widths(doc: &LopdfDocument, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(resolve(doc, &w[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (k, o) in list.iter().enumerate() {
                    let Some(code) = u32::try_from(k).ok().and_then(|k| first.checked_add(k)) else {
                        break;
                    };
                    if let Some(width) = number(resolve(doc, o)) {
                        widths.insert(code, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) =
                    (number(last), w.get(i + 2).and_then(|o| number(resolve(doc, o))))
                else {
                    break;
                };
                for code in first..=(last.max(0.0) as u32).min(first.saturating_add(0xFFFF)) {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn apply_descriptor(doc: &LopdfDocument, descriptor: Option<&Dictionary>, metrics: &mut FontMetrics) {
    let Some(descriptor) = descriptor else {
        return;
    };
    if let Some(ascent) = dict_entry_obj(doc, descriptor, b"Ascent")
        .and_then(number)
        .filter(|a| *a > 0.0)
    {
        metrics.ascent = ascent;
    }
    if let Some(descent) = dict_entry_obj(doc, descriptor, b"Descent")
        .and_then(number)
        .filter(|d| *d < 0.0)
    {
        metrics.descent = descent;
    }
}

fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn dict_entry_obj<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|o| resolve(doc, o))
}

fn dict_entry<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict_entry_obj(doc, dict, key).and_then(|o| o.as_dict().ok())
}

fn name_of<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    dict.get(key).ok().and_then(|o| o.as_name().ok())
}

/// Extract a number from a PDF object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
