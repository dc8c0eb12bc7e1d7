//! # nopii
//!
//! Detect personal information in PDF documents and redact it.
//!
//! Each page's text is extracted together with the position of every word.
//! Exact-format identifiers are found with pattern rules and names, places,
//! organizations and dates with a swappable entity recognizer. The detected
//! text is covered with opaque boxes that are drawn into the page content,
//! and the glyphs underneath are removed from the content stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nopii::{redact_file, RedactOptions};
//!
//! fn main() -> nopii::Result<()> {
//!     let report = redact_file("form.pdf", "form_redacted.pdf", &RedactOptions::default())?;
//!     println!("{} spans redacted", report.totals.spans);
//!     Ok(())
//! }
//! ```
//!
//! ## Reusing a model
//!
//! Entity models are expensive to build. Load one once and share it between
//! pipelines and threads:
//!
//! ```no_run
//! use std::sync::Arc;
//! use nopii::{LexiconModel, Pipeline, RedactOptions};
//!
//! let model = Arc::new(LexiconModel::from_file("models/en_core_lexicon.json")?);
//! let pipeline = Pipeline::new(RedactOptions::default(), model)?;
//!
//! let data = std::fs::read("form.pdf")?;
//! let output = pipeline.redact(&data)?;
//! std::fs::write("form_redacted.pdf", &output.pdf)?;
//! # Ok::<(), nopii::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Layout-aware extraction**: reading order across columns, per-word geometry
//! - **Pattern and entity detection**: configurable rules and categories
//! - **Genuine redaction**: painted boxes plus removal of the covered text
//! - **Parallel processing**: uses Rayon for multi-page documents
//! - **Audit report**: offsets and categories per page, never the text itself

pub mod detect;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod model;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod redact;
pub mod report;

#[cfg(feature = "ffi")]
pub mod ffi;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, is_pdf_bytes, PdfFormat};
pub use detector::{
    EntityDetector, EntityRecognizer, LexiconModel, PatternDetector, PatternRule, RecognizedEntity,
    RuleValidator,
};
pub use error::{Error, ErrorKind, ErrorReport, Result};
pub use geometry::GeometryMapper;
pub use model::{
    BBox, CandidateSpan, Category, Document, EntityCategory, Metadata, Page, PositionedToken,
    RedactionBox, ReconciledSpan, Rgb, Source,
};
pub use options::RedactOptions;
pub use parser::{ExtractOptions, PageLayoutExtractor};
pub use pipeline::{Analysis, PageAnalysis, Pipeline, RedactionOutput};
pub use reconcile::{OverlapPolicy, SpanReconciler};
pub use redact::{RedactStats, Redactor};
pub use report::{RedactionReport, PageReport};

use std::path::{Path, PathBuf};

/// Redact a PDF held in memory with the builtin model.
///
/// The model is built on the first call and reused afterwards. Keep a
/// [`Pipeline`] instead when the same options apply to many documents.
///
/// # Example
///
/// ```no_run
/// use nopii::{redact_bytes, RedactOptions};
///
/// let data = std::fs::read("form.pdf").unwrap();
/// let output = redact_bytes(&data, &RedactOptions::default()).unwrap();
/// std::fs::write("form_redacted.pdf", output.pdf).unwrap();
/// ```
pub fn redact_bytes(data: &[u8], options: &RedactOptions) -> Result<RedactionOutput> {
    Pipeline::with_builtin_model(options.clone())?.redact(data)
}

/// Redact `input` into `output` with the builtin model.
///
/// The output file is only written once the whole document has been
/// redacted, through a temporary file renamed into place. A failed run
/// leaves neither a partial output nor the temporary file behind.
pub fn redact_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &RedactOptions,
) -> Result<RedactionReport> {
    let data = std::fs::read(input)?;
    let result = redact_bytes(&data, options)?;
    write_replacing(output.as_ref(), &result.pdf)?;
    Ok(result.report)
}

/// Write `data` next to `path` and rename it over `path`.
fn write_replacing(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path);
    if let Err(e) = std::fs::write(&tmp, data).and_then(|_| std::fs::rename(&tmp, path)) {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            log::debug!("Could not remove {}: {}", tmp.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Detect PII without writing anything.
///
/// # Example
///
/// ```no_run
/// use nopii::{analyze_bytes, RedactOptions};
///
/// let data = std::fs::read("form.pdf").unwrap();
/// let analysis = analyze_bytes(&data, &RedactOptions::default()).unwrap();
/// for page in &analysis.pages {
///     println!("page {}: {} spans", page.index + 1, page.spans.len());
/// }
/// ```
pub fn analyze_bytes(data: &[u8], options: &RedactOptions) -> Result<Analysis> {
    Pipeline::with_builtin_model(options.clone())?.analyze(data)
}

/// Extract the linear text of every page, for inspecting what detectors see.
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let data = std::fs::read(path)?;
    let doc = PageLayoutExtractor::default().extract(&data)?;
    Ok(doc.plain_text())
}

/// Redact a file on a blocking worker thread.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> nopii::Result<()> {
/// use nopii::{redact_file_async, RedactOptions};
///
/// let report = redact_file_async("form.pdf", "form_redacted.pdf", RedactOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "async")]
pub async fn redact_file_async<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: RedactOptions,
) -> Result<RedactionReport> {
    let data = tokio::fs::read(input).await?;
    let output = output.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<RedactionReport> {
        let result = redact_bytes(&data, &options)?;
        write_replacing(&output, &result.pdf)?;
        Ok(result.report)
    })
    .await
    .map_err(|e| Error::Aborted(format!("worker task failed: {}", e)))?
}
