//! Document model types for the redaction pipeline.
//!
//! Everything here is created fresh for one pipeline run: pages with their
//! positioned tokens and linear text, the spans detected in that text, and the
//! rectangles that will be painted over them.

mod document;
mod page;
mod redaction;
mod span;
mod text;
mod token;

pub use document::{Document, Metadata};
pub use page::Page;
pub use redaction::{RedactionBox, Rgb};
pub use span::{CandidateSpan, Category, EntityCategory, ReconciledSpan, Source};
pub use text::{LinearTextBuilder, OffsetMap};
pub use token::{BBox, PositionedToken};
