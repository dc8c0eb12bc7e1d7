//! Named resources a content stream can draw with.
//!
//! Text can live in the page's own content stream or in Form XObjects the
//! page paints with `Do`. Both are described here so the interpreter can
//! follow `Do` into a form with the fonts that form actually sees.

use std::collections::HashMap;

use lopdf::content::Operation;
use lopdf::ObjectId;

use super::content::Matrix;
use super::fonts::{PageFont, PageFonts};

/// Deepest chain of nested forms the interpreter follows.
pub const MAX_FORM_DEPTH: usize = 8;

/// Most Form XObjects loaded for a single page.
pub const MAX_FORMS_PER_PAGE: usize = 64;

/// Fonts and Form XObjects available to one content stream.
#[derive(Debug, Default)]
pub struct Resources<'a> {
    pub fonts: PageFonts<'a>,
    /// Form XObjects keyed by resource name; image XObjects are not kept
    pub forms: HashMap<Vec<u8>, FormXObject<'a>>,
}

impl<'a> Resources<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources holding only fonts.
    pub fn from_fonts(fonts: PageFonts<'a>) -> Self {
        Self {
            fonts,
            forms: HashMap::new(),
        }
    }

    pub fn with_font(mut self, name: &[u8], font: PageFont<'a>) -> Self {
        self.fonts.insert(name.to_vec(), font);
        self
    }

    pub fn with_form(mut self, name: &[u8], form: FormXObject<'a>) -> Self {
        self.forms.insert(name.to_vec(), form);
        self
    }

    pub fn font(&self, name: &[u8]) -> Option<&PageFont<'a>> {
        self.fonts.get(name)
    }

    pub fn form(&self, name: &[u8]) -> Option<&FormXObject<'a>> {
        self.forms.get(name)
    }
}

/// A decoded Form XObject.
#[derive(Debug)]
pub struct FormXObject<'a> {
    /// Object holding the form's stream
    pub id: ObjectId,
    /// Form space to user space, from the form's /Matrix
    pub matrix: Matrix,
    pub operations: Vec<Operation>,
    /// The form's own /Resources. `None` means it draws with the resources
    /// of the stream that invokes it.
    pub resources: Option<Resources<'a>>,
}

impl FormXObject<'_> {
    pub fn new(id: ObjectId, operations: Vec<Operation>) -> Self {
        Self {
            id,
            matrix: Matrix::IDENTITY,
            operations,
            resources: None,
        }
    }
}

impl<'a> FormXObject<'a> {
    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_resources(mut self, resources: Resources<'a>) -> Self {
        self.resources = Some(resources);
        self
    }
}
