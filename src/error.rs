//! Error types for the nopii library.

use std::io;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for nopii operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while redacting a PDF.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The PDF file structure could not be loaded.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// The document has no pages.
    #[error("Document has no pages")]
    NoPages,

    /// Layout or text extraction failed after the file itself loaded.
    #[error("Text extraction error: {0}")]
    Extraction(String),

    /// The entity recognition model could not be loaded.
    #[error("Entity model unavailable: {0}")]
    ModelUnavailable(String),

    /// Invalid options (bad pattern rule, malformed config file).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rewriting or re-serializing the output document failed.
    #[error("Redaction error: {0}")]
    Redaction(String),

    /// The run was cancelled or exceeded its time budget.
    #[error("Aborted: {0}")]
    Aborted(String),
}

/// Coarse error classification reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Not a valid or parsable PDF.
    Input,
    /// The file parsed but its layout could not be extracted.
    Extraction,
    /// The entity model failed to load; a process-level misconfiguration.
    ModelUnavailable,
    /// Options could not be applied; a process-level misconfiguration.
    Configuration,
    /// The output document could not be written.
    Redaction,
    /// Cancelled or timed out before output was produced.
    Aborted,
}

impl ErrorKind {
    /// Whether this kind indicates a problem with the process rather than the request.
    pub fn is_fatal_to_process(&self) -> bool {
        matches!(self, ErrorKind::ModelUnavailable | ErrorKind::Configuration)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Input => "input",
            ErrorKind::Extraction => "extraction",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Redaction => "redaction",
            ErrorKind::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::UnknownFormat | Error::UnsupportedVersion(_) | Error::PdfParse(_) => {
                ErrorKind::Input
            }
            Error::Encrypted | Error::NoPages | Error::Extraction(_) => ErrorKind::Extraction,
            Error::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::Redaction(_) => ErrorKind::Redaction,
            Error::Aborted(_) => ErrorKind::Aborted,
        }
    }

    /// Build the structured report handed back to API callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Structured error with a human-readable message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::ModelUnavailable("missing file".into());
        assert_eq!(err.to_string(), "Entity model unavailable: missing file");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::UnknownFormat.kind(), ErrorKind::Input);
        assert_eq!(Error::PdfParse("x".into()).kind(), ErrorKind::Input);
        assert_eq!(Error::NoPages.kind(), ErrorKind::Extraction);
        assert_eq!(Error::Encrypted.kind(), ErrorKind::Extraction);
        assert_eq!(Error::Redaction("x".into()).kind(), ErrorKind::Redaction);
        assert!(Error::ModelUnavailable("x".into()).kind().is_fatal_to_process());
        assert!(!Error::NoPages.kind().is_fatal_to_process());
    }

    #[test]
    fn test_error_report_json() {
        let report = Error::NoPages.report();
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"kind":"extraction","message":"Document has no pages"}"#);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Input);
    }
}
