//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for the few document operations the
//! extractor needs, isolating lopdf from the layout analysis logic.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::content::Matrix;
use super::fonts::{load_font, load_fonts, number};
use super::resources::{FormXObject, Resources, MAX_FORMS_PER_PAGE, MAX_FORM_DEPTH};
use crate::error::{Error, Result};
use crate::model::BBox;

/// Page identifier: (object number, generation number).
pub type PageId = ObjectId;

/// Maximum depth followed when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Abstract interface for PDF document access.
pub trait PdfBackend: Sync {
    /// All pages in document order.
    fn page_ids(&self) -> Vec<PageId>;

    /// The page's MediaBox, following inheritance. Defaults to Letter.
    fn media_box(&self, page: PageId) -> BBox;

    /// Decoded content stream operations for a page. A page without content yields none.
    fn page_operations(&self, page: PageId) -> Result<Vec<Operation>>;

    /// Fonts and Form XObjects referenced by the page's resources.
    fn page_resources(&self, page: PageId) -> Result<Resources<'_>>;

    fn is_encrypted(&self) -> bool {
        false
    }

    /// PDF version string, e.g. "1.7".
    fn version(&self) -> String;
}

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
}

impl LopdfBackend {
    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(e.to_string()),
        })?;
        Ok(Self { doc })
    }

    /// Mutable access for the redactor.
    pub fn raw_doc_mut(&mut self) -> &mut LopdfDocument {
        &mut self.doc
    }

    /// Raw, decompressed content of a page, with multiple streams joined by whitespace.
    pub fn page_content(&self, page_id: PageId) -> Result<Vec<u8>> {
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        let refs: Vec<ObjectId> = match contents {
            Object::Reference(r) => match self.doc.get_object(*r) {
                Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
                _ => vec![*r],
            },
            Object::Array(arr) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => return Err(Error::Extraction("Invalid content stream".to_string())),
        };

        let mut content = Vec::new();
        for r in refs {
            match self.doc.get_object(r) {
                Ok(Object::Stream(s)) => {
                    let data = s
                        .decompressed_content()
                        .unwrap_or_else(|_| s.content.clone());
                    content.extend_from_slice(&data);
                    content.push(b'\n');
                }
                _ => return Err(Error::Extraction(format!("Missing content stream {} {}", r.0, r.1))),
            }
        }
        Ok(content)
    }

    fn inherited<'a>(&'a self, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let mut dict = page;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Some(match value {
                    Object::Reference(id) => self.doc.get_object(*id).ok()?,
                    other => other,
                });
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// The page's /Resources dictionary, following inheritance.
    pub(crate) fn resources_dict(&self, page: PageId) -> Option<&Dictionary> {
        let page_dict = self.doc.get_dictionary(page).ok()?;
        self.inherited(page_dict, b"Resources")?.as_dict().ok()
    }

    /// Stream dictionary of a Form XObject.
    pub(crate) fn form_dict(&self, form: ObjectId) -> Option<&Dictionary> {
        match self.doc.get_object(form) {
            Ok(Object::Stream(stream)) => Some(&stream.dict),
            _ => None,
        }
    }

    /// A dictionary value, following one indirect reference.
    pub(crate) fn dict_value<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        match dict.get(key).ok()? {
            Object::Reference(id) => self.doc.get_dictionary(*id).ok(),
            other => other.as_dict().ok(),
        }
    }

    /// Decoded operations of a Form XObject's content stream.
    pub(crate) fn form_operations(&self, form: ObjectId) -> Result<Vec<Operation>> {
        let stream = match self.doc.get_object(form) {
            Ok(Object::Stream(stream)) => stream,
            _ => return Err(Error::Extraction(format!("Missing form stream {} {}", form.0, form.1))),
        };
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let content = Content::decode(&data).map_err(|e| Error::Extraction(e.to_string()))?;
        Ok(content.operations)
    }

    /// Form XObjects named in a /Resources dictionary, with their own resources
    /// loaded recursively. `budget` caps the forms loaded for one page.
    fn load_forms<'a>(
        &'a self,
        resources: &Dictionary,
        depth: usize,
        budget: &mut usize,
    ) -> HashMap<Vec<u8>, FormXObject<'a>> {
        let mut forms = HashMap::new();
        if depth >= MAX_FORM_DEPTH {
            return forms;
        }
        let Some(xobjects) = self.dict_value(resources, b"XObject") else {
            return forms;
        };

        for (name, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else {
                continue;
            };
            let Some(dict) = self.form_dict(id) else {
                continue;
            };
            if dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(b"Form".as_slice()) {
                continue;
            }
            if *budget == 0 {
                log::warn!("More than {} Form XObjects on one page, the rest are not read", MAX_FORMS_PER_PAGE);
                break;
            }
            *budget -= 1;

            let operations = match self.form_operations(id) {
                Ok(operations) => operations,
                Err(e) => {
                    log::warn!("Skipping Form XObject {}: {}", String::from_utf8_lossy(name), e);
                    continue;
                }
            };
            let matrix = dict
                .get(b"Matrix")
                .and_then(Object::as_array)
                .ok()
                .and_then(|m| Matrix::from_operands(m))
                .unwrap_or_default();
            let own = self.dict_value(dict, b"Resources").map(|res| Resources {
                fonts: load_fonts(&self.doc, res),
                forms: self.load_forms(res, depth + 1, budget),
            });

            forms.insert(
                name.clone(),
                FormXObject {
                    id,
                    matrix,
                    operations,
                    resources: own,
                },
            );
        }
        forms
    }
}

impl PdfBackend for LopdfBackend {
    fn page_ids(&self) -> Vec<PageId> {
        self.doc.get_pages().into_values().collect()
    }

    fn media_box(&self, page: PageId) -> BBox {
        let values: Option<Vec<f32>> = self
            .doc
            .get_dictionary(page)
            .ok()
            .and_then(|dict| self.inherited(dict, b"MediaBox"))
            .and_then(|o| o.as_array().ok())
            .map(|arr| arr.iter().filter_map(number).collect());

        match values.as_deref() {
            Some([x0, y0, x1, y1]) => BBox::new(*x0, *y0, *x1, *y1),
            _ => BBox::new(0.0, 0.0, 612.0, 792.0),
        }
    }

    fn page_operations(&self, page: PageId) -> Result<Vec<Operation>> {
        let data = self.page_content(page)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let content = Content::decode(&data).map_err(|e| Error::Extraction(e.to_string()))?;
        Ok(content.operations)
    }

    fn page_resources(&self, page: PageId) -> Result<Resources<'_>> {
        let fonts = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| Error::Extraction(e.to_string()))?;
        let mut resources = Resources::from_fonts(
            fonts
                .into_iter()
                .map(|(name, dict)| (name, load_font(&self.doc, dict)))
                .collect(),
        );
        if let Some(dict) = self.resources_dict(page) {
            let mut budget = MAX_FORMS_PER_PAGE;
            resources.forms = self.load_forms(dict, 0, &mut budget);
        }
        Ok(resources)
    }

    fn is_encrypted(&self) -> bool {
        self.doc.is_encrypted()
    }

    fn version(&self) -> String {
        self.doc.version.to_string()
    }
}
