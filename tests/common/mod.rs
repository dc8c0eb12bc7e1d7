//! Shared PDF fixtures for integration tests.
//!
//! Pages use 12pt Courier, so every glyph is 7.2pt wide and spans
//! y - 2.4 ..= y + 9.6 around its baseline.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

pub const FONT_SIZE: f32 = 12.0;
pub const GLYPH_WIDTH: f32 = 7.2;

/// Offset of form space below page space in [`PdfBuilder::form_page`].
pub const FORM_SHIFT: f32 = 100.0;

struct PageFixture {
    runs: Vec<(f32, f32, String)>,
    /// Draw the runs from a Form XObject instead of the page content
    in_form: bool,
}

/// Builds small text-only PDFs with lopdf.
#[derive(Default)]
pub struct PdfBuilder {
    pages: Vec<PageFixture>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page showing each `(x, y, text)` run at its baseline origin.
    pub fn page(mut self, runs: &[(f32, f32, &str)]) -> Self {
        self.pages.push(PageFixture {
            runs: runs.iter().map(|(x, y, t)| (*x, *y, t.to_string())).collect(),
            in_form: false,
        });
        self
    }

    /// Add a page whose content is only `q /Fm1 Do Q`. The form shows the
    /// runs, stored `FORM_SHIFT` higher and moved back down by its /Matrix,
    /// so they land at the given page coordinates.
    pub fn form_page(mut self, runs: &[(f32, f32, &str)]) -> Self {
        self.pages.push(PageFixture {
            runs: runs.iter().map(|(x, y, t)| (*x, *y + FORM_SHIFT, t.to_string())).collect(),
            in_form: true,
        });
        self
    }

    /// Add a page with one line per entry, 14pt apart, starting at (72, 700).
    pub fn lines(self, lines: &[&str]) -> Self {
        let runs: Vec<(f32, f32, &str)> = lines
            .iter()
            .enumerate()
            .map(|(i, t)| (72.0, 700.0 - 14.0 * i as f32, *t))
            .collect();
        self.page(&runs)
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for fixture in &self.pages {
            let mut operations = Vec::new();
            for (x, y, text) in &fixture.runs {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), Object::Real(FONT_SIZE)]));
                operations.push(Operation::new("Td", vec![Object::Real(*x), Object::Real(*y)]));
                operations.push(Operation::new("Tj", vec![Object::String(latin1(text), StringFormat::Literal)]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations }.encode().unwrap();

            let (content, resources) = if fixture.in_form {
                let form_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Form",
                        "BBox" => vec![0.into(), 0.into(), 612.into(), 892.into()],
                        "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), Object::Real(-FORM_SHIFT)],
                        "Resources" => resources_id,
                    },
                    content,
                ));
                let paint = Content {
                    operations: vec![
                        Operation::new("q", vec![]),
                        Operation::new("Do", vec!["Fm1".into()]),
                        Operation::new("Q", vec![]),
                    ],
                };
                let resources = doc.add_object(dictionary! {
                    "XObject" => dictionary! { "Fm1" => form_id },
                });
                (paint.encode().unwrap(), resources)
            } else {
                (content, resources_id)
            };

            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}

/// Encode text for a WinAnsi font. Only Latin-1 characters are supported.
pub fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect()
}

/// Single-page PDF with one line per entry.
pub fn text_pdf(lines: &[&str]) -> Vec<u8> {
    PdfBuilder::new().lines(lines).build()
}

/// Linear text of every page.
pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    nopii::PageLayoutExtractor::default()
        .extract(pdf)
        .unwrap()
        .pages
        .iter()
        .map(|p| p.text().to_string())
        .collect()
}

/// Decompressed content of every stream in the file, concatenated.
pub fn all_stream_bytes(pdf: &[u8]) -> Vec<u8> {
    let doc = Document::load_mem(pdf).unwrap();
    let mut out = Vec::new();
    for object in doc.objects.values() {
        if let Object::Stream(stream) = object {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            out.extend_from_slice(&data);
        }
    }
    out
}

pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
