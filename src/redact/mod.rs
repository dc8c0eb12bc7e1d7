//! Writing redaction boxes into the output document.
//!
//! Each affected page gets a single new content stream: the original
//! operations (with covered glyphs removed) wrapped in `q`/`Q`, followed by
//! opaque filled rectangles clipped to the MediaBox. Form XObjects that lose
//! glyphs are replaced by redacted copies. Unreferenced objects are pruned
//! before saving so the replaced streams, and the text they held, do not
//! survive in the file.

mod forms;
mod rewrite;

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{BBox, RedactionBox, Rgb};
use crate::parser::{Interpreter, LopdfBackend, PageId, PdfBackend};

use forms::{strip_page, FormCopy, XObjectEdit};

pub(crate) use rewrite::strip_glyphs;

/// Counters describing what a redaction pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RedactStats {
    pub pages_modified: usize,
    pub boxes_drawn: usize,
    pub glyphs_removed: usize,
}

/// Everything that changes on one page.
struct PageRewrite {
    page: PageId,
    content: Vec<u8>,
    resources: Option<XObjectEdit>,
    forms: Vec<FormCopy>,
    removed: usize,
    painted: usize,
}

/// Output of [`Redactor::redact`].
#[derive(Debug, Clone)]
pub struct Redacted {
    pub pdf: Vec<u8>,
    pub stats: RedactStats,
}

/// Paints opaque boxes over page regions and removes the text beneath them.
#[derive(Debug, Clone, Copy)]
pub struct Redactor {
    color: Rgb,
    margin: f32,
    remove_text: bool,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(Rgb::BLACK, 1.0)
    }
}

impl Redactor {
    pub fn new(color: Rgb, margin: f32) -> Self {
        Self {
            color,
            margin: margin.max(0.0),
            remove_text: true,
        }
    }

    /// Keep covered glyphs in the content stream and only paint over them.
    pub fn with_remove_text(mut self, remove_text: bool) -> Self {
        self.remove_text = remove_text;
        self
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Apply `boxes` to `original` and re-serialize the document.
    ///
    /// Boxes are grouped by page; pages without boxes keep their content
    /// streams. With no boxes at all the input bytes are returned unchanged.
    pub fn redact(&self, original: &[u8], boxes: &[RedactionBox]) -> Result<Redacted> {
        if boxes.is_empty() {
            return Ok(Redacted {
                pdf: original.to_vec(),
                stats: RedactStats::default(),
            });
        }

        let mut backend = LopdfBackend::load_bytes(original)
            .map_err(|e| Error::Redaction(format!("cannot reload document: {}", e)))?;
        let page_ids = backend.page_ids();

        let mut by_page: BTreeMap<usize, Vec<BBox>> = BTreeMap::new();
        for b in boxes {
            if b.page >= page_ids.len() {
                return Err(Error::Redaction(format!(
                    "box on page {} but document has {} pages",
                    b.page,
                    page_ids.len()
                )));
            }
            by_page.entry(b.page).or_default().push(b.rect.expand(self.margin));
        }

        let mut stats = RedactStats::default();
        let mut rewritten = Vec::with_capacity(by_page.len());
        for (index, rects) in &by_page {
            let rewrite = self.rewrite_page(&backend, page_ids[*index], rects)?;
            log::debug!(
                "Page {}: {} boxes, {} glyphs removed, {} forms copied",
                index,
                rewrite.painted,
                rewrite.removed,
                rewrite.forms.len()
            );
            stats.pages_modified += 1;
            stats.boxes_drawn += rewrite.painted;
            stats.glyphs_removed += rewrite.removed;
            rewritten.push(rewrite);
        }

        let doc = backend.raw_doc_mut();
        for rewrite in rewritten {
            // Children sit after their parents, so ids exist before they are referenced
            let mut ids = HashMap::new();
            for form in rewrite.forms.iter().rev() {
                let mut dict = form.dict.clone();
                if let Some(edit) = &form.resources {
                    dict.set("Resources", edit.apply(form.stream, &rewrite.forms, &ids));
                }
                dict.set("Filter", "FlateDecode");
                let id = doc.add_object(Stream::new(dict, compress(&form.content)?));
                ids.insert(form.stream, id);
            }

            let stream = Stream::new(dictionary! { "Filter" => "FlateDecode" }, compress(&rewrite.content)?);
            let stream_id = doc.add_object(stream);
            let page = doc
                .get_object_mut(rewrite.page)
                .and_then(Object::as_dict_mut)
                .map_err(|e| Error::Redaction(e.to_string()))?;
            page.set("Contents", stream_id);
            if let Some(edit) = &rewrite.resources {
                page.set("Resources", edit.apply(0, &rewrite.forms, &ids));
            }
        }
        doc.prune_objects();

        let mut pdf = Vec::new();
        doc.save_to(&mut pdf)
            .map_err(|e| Error::Redaction(format!("cannot serialize document: {}", e)))?;
        Ok(Redacted { pdf, stats })
    }

    /// New content for one page. `rects` are already margin-expanded.
    fn rewrite_page(&self, backend: &LopdfBackend, page: PageId, rects: &[BBox]) -> Result<PageRewrite> {
        let ops = backend
            .page_operations(page)
            .map_err(|e| Error::Redaction(e.to_string()))?;

        let mut rewrite = PageRewrite {
            page,
            content: Vec::new(),
            resources: None,
            forms: Vec::new(),
            removed: 0,
            painted: 0,
        };
        let ops = if self.remove_text {
            let resources = backend
                .page_resources(page)
                .map_err(|e| Error::Redaction(e.to_string()))?;
            let run = Interpreter::new().run(&ops, &resources);
            let stripped = strip_page(backend, page, ops, &run, |glyph| {
                let (x, y) = glyph.bbox.center();
                rects.iter().any(|r| r.contains_point(x, y))
            })?;
            rewrite.resources = stripped.resources;
            rewrite.forms = stripped.forms;
            rewrite.removed = stripped.removed;
            stripped.ops
        } else {
            ops
        };

        // Text placed off the page is still removed above, but only the visible part is painted
        let media_box = backend.media_box(page);
        let visible: Vec<BBox> = rects.iter().filter_map(|r| r.intersection(&media_box)).collect();
        rewrite.painted = visible.len();

        let [r, g, b] = self.color.to_unit();
        let mut operations = Vec::with_capacity(ops.len() + visible.len() * 2 + 5);
        operations.push(Operation::new("q", vec![]));
        operations.extend(ops);
        operations.push(Operation::new("Q", vec![]));
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "rg",
            vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        ));
        for rect in &visible {
            operations.push(Operation::new(
                "re",
                vec![
                    Object::Real(rect.x0),
                    Object::Real(rect.y0),
                    Object::Real(rect.width()),
                    Object::Real(rect.height()),
                ],
            ));
            operations.push(Operation::new("f", vec![]));
        }
        operations.push(Operation::new("Q", vec![]));

        rewrite.content = Content { operations }
            .encode()
            .map_err(|e| Error::Redaction(e.to_string()))?;
        Ok(rewrite)
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Redaction(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Redaction(format!("compression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document as LopdfDocument;

    /// One Courier page per entry, each showing its text at (72, 700) in 12pt.
    fn fixture(pages: &[&str]) -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
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
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
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

    fn page_text(pdf: &[u8], index: usize) -> String {
        let backend = LopdfBackend::load_bytes(pdf).unwrap();
        let page = backend.page_ids()[index];
        let ops = backend.page_operations(page).unwrap();
        let resources = backend.page_resources(page).unwrap();
        crate::parser::interpret(&ops, &resources)
            .into_iter()
            .map(|g| g.text)
            .collect()
    }

    /// Two pages painting one shared form. The form shows `text` at its
    /// origin and is placed at (72, 700) by its /Matrix.
    fn shared_form_fixture(text: &str) -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let form_content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 72.into(), 700.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            },
            form_content.encode().unwrap(),
        ));

        let mut kids = Vec::new();
        for _ in 0..2 {
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new("Do", vec!["Fm1".into()]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "XObject" => dictionary! { "Fm1" => form_id } },
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
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

    /// Box over the `n` characters starting at column `from`, 7.2pt per glyph.
    fn columns(page: usize, from: usize, n: usize) -> RedactionBox {
        let x0 = 72.0 + 7.2 * from as f32;
        RedactionBox::new(page, BBox::new(x0, 697.6, x0 + 7.2 * n as f32, 709.6))
    }

    #[test]
    fn test_no_boxes_returns_input() {
        let pdf = fixture(&["Hello"]);
        let out = Redactor::default().redact(&pdf, &[]).unwrap();
        assert_eq!(out.pdf, pdf);
        assert_eq!(out.stats, RedactStats::default());
    }

    #[test]
    fn test_covered_text_is_removed_and_box_drawn() {
        let pdf = fixture(&["Name John Tan here"]);
        let out = Redactor::default().redact(&pdf, &[columns(0, 5, 8)]).unwrap();

        assert_eq!(out.stats.pages_modified, 1);
        assert_eq!(out.stats.boxes_drawn, 1);
        assert_eq!(out.stats.glyphs_removed, 8);
        let text = page_text(&out.pdf, 0);
        assert!(!text.contains("John"));
        assert!(text.starts_with("Name "));
        assert!(text.ends_with(" here"));

        let backend = LopdfBackend::load_bytes(&out.pdf).unwrap();
        let ops = backend.page_operations(backend.page_ids()[0]).unwrap();
        let operators: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(operators.first(), Some(&"q"));
        assert!(operators.ends_with(&["q", "rg", "re", "f", "Q"]));
    }

    #[test]
    fn test_keep_text_only_paints() {
        let pdf = fixture(&["Name John Tan"]);
        let out = Redactor::default()
            .with_remove_text(false)
            .redact(&pdf, &[columns(0, 5, 8)])
            .unwrap();
        assert_eq!(out.stats.glyphs_removed, 0);
        assert_eq!(page_text(&out.pdf, 0), "Name John Tan");
    }

    #[test]
    fn test_untouched_pages_keep_content() {
        let pdf = fixture(&["First S1234567D", "Second page"]);
        let out = Redactor::new(Rgb(255, 0, 0), 2.0)
            .redact(&pdf, &[columns(0, 6, 9)])
            .unwrap();
        assert_eq!(out.stats.pages_modified, 1);
        assert_eq!(page_text(&out.pdf, 0), "First ");
        assert_eq!(page_text(&out.pdf, 1), "Second page");

        let backend = LopdfBackend::load_bytes(&out.pdf).unwrap();
        assert_eq!(backend.page_ids().len(), 2);
        let fill = backend
            .page_operations(backend.page_ids()[0])
            .unwrap()
            .into_iter()
            .find(|o| o.operator == "re")
            .unwrap();
        let values: Vec<f32> = fill.operands.iter().filter_map(crate::parser::number).collect();
        // 2pt margin on each side
        assert!((values[0] - (72.0 + 7.2 * 6.0 - 2.0)).abs() < 1e-3);
        assert!((values[2] - (7.2 * 9.0 + 4.0)).abs() < 1e-3);
    }

    #[test]
    fn test_form_text_is_removed_from_a_copy() {
        let pdf = shared_form_fixture("NRIC S1234567D");
        assert_eq!(page_text(&pdf, 0), "NRIC S1234567D");

        let out = Redactor::default().redact(&pdf, &[columns(0, 5, 9)]).unwrap();
        assert_eq!(out.stats.glyphs_removed, 9);
        assert_eq!(page_text(&out.pdf, 0), "NRIC ");
        // The other page still paints the untouched form
        assert_eq!(page_text(&out.pdf, 1), "NRIC S1234567D");

        let backend = LopdfBackend::load_bytes(&out.pdf).unwrap();
        let page = backend.page_ids()[0];
        let painted: Vec<Object> = backend
            .page_operations(page)
            .unwrap()
            .into_iter()
            .filter(|o| o.operator == "Do")
            .flat_map(|o| o.operands)
            .collect();
        assert_eq!(painted, vec![Object::Name(b"Redacted1".to_vec())]);
        let resources = backend.page_resources(page).unwrap();
        assert!(resources.form(b"Redacted1").is_some());
        assert!(resources.form(b"Fm1").is_none());
    }

    #[test]
    fn test_form_painted_only_by_redacted_pages_is_pruned() {
        let pdf = shared_form_fixture("ID S1234567D");
        let boxes = [columns(0, 3, 9), columns(1, 3, 9)];
        let out = Redactor::default().redact(&pdf, &boxes).unwrap();
        assert_eq!(out.stats.glyphs_removed, 18);

        let doc = LopdfDocument::load_mem(&out.pdf).unwrap();
        for object in doc.objects.values() {
            if let Object::Stream(stream) = object {
                let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
                assert!(!data.windows(9).any(|w| w == b"S1234567D"));
            }
        }
    }

    #[test]
    fn test_boxes_are_clipped_to_media_box() {
        let pdf = fixture(&["Hello"]);
        let boxes = [
            RedactionBox::new(0, BBox::new(600.0, 697.6, 5000.0, 709.6)),
            RedactionBox::new(0, BBox::new(2000.0, 697.6, 2100.0, 709.6)),
        ];
        let out = Redactor::default().redact(&pdf, &boxes).unwrap();
        assert_eq!(out.stats.boxes_drawn, 1);

        let backend = LopdfBackend::load_bytes(&out.pdf).unwrap();
        let fill = backend
            .page_operations(backend.page_ids()[0])
            .unwrap()
            .into_iter()
            .find(|o| o.operator == "re")
            .unwrap();
        let values: Vec<f32> = fill.operands.iter().filter_map(crate::parser::number).collect();
        assert!((values[0] + values[2] - 612.0).abs() < 1e-3);
    }

    #[test]
    fn test_box_on_missing_page_is_redaction_error() {
        let pdf = fixture(&["Hello"]);
        let err = Redactor::default().redact(&pdf, &[columns(3, 0, 1)]).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Redaction);
    }

    #[test]
    fn test_old_content_stream_is_pruned() {
        let pdf = fixture(&["Secret S1234567D"]);
        let out = Redactor::default().redact(&pdf, &[columns(0, 7, 9)]).unwrap();
        let doc = LopdfDocument::load_mem(&out.pdf).unwrap();
        for object in doc.objects.values() {
            if let Object::Stream(stream) = object {
                let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
                assert!(!data.windows(9).any(|w| w == b"S1234567D"));
            }
        }
    }
}
