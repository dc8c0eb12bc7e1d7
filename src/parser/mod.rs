//! PDF parsing module.
//!
//! Loads a document, interprets each page's content stream (and the Form
//! XObjects it paints) into glyphs and lays the glyphs out as reading-order
//! tokens.

mod backend;
mod content;
mod extractor;
mod fonts;
mod layout;
mod options;
mod resources;

pub use backend::{LopdfBackend, PageId, PdfBackend};
pub use content::{interpret, FormInvocation, Glyph, Interpretation, Interpreter, Matrix};
pub use extractor::PageLayoutExtractor;
pub use fonts::{CodeDecoder, FontMetrics, PageFont, PageFonts};
pub(crate) use fonts::number;
pub use layout::{assemble_words, build_layout, detect_columns, group_lines, order_lines, Column, Line, Word};
pub use options::ExtractOptions;
pub use resources::{FormXObject, Resources, MAX_FORMS_PER_PAGE, MAX_FORM_DEPTH};
