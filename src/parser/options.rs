//! Layout extraction options.

use serde::{Deserialize, Serialize};

/// Options controlling how glyphs are grouped into tokens and lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Whether to extract pages in parallel
    pub parallel: bool,

    /// Horizontal gap, as a fraction of font size, that splits two words
    pub word_gap_ratio: f32,

    /// Baseline difference, as a fraction of font size, still considered the same line
    pub line_tolerance_ratio: f32,

    /// Whether to detect two-column layouts and read them column by column
    pub detect_columns: bool,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the word gap ratio.
    pub fn with_word_gap_ratio(mut self, ratio: f32) -> Self {
        self.word_gap_ratio = ratio;
        self
    }

    /// Set the line tolerance ratio.
    pub fn with_line_tolerance_ratio(mut self, ratio: f32) -> Self {
        self.line_tolerance_ratio = ratio;
        self
    }

    /// Enable or disable column detection.
    pub fn with_columns(mut self, detect: bool) -> Self {
        self.detect_columns = detect;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            word_gap_ratio: 0.15,
            line_tolerance_ratio: 0.3,
            detect_columns: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_options_builder() {
        let options = ExtractOptions::new()
            .sequential()
            .with_word_gap_ratio(0.3)
            .with_columns(false);

        assert!(!options.parallel);
        assert_eq!(options.word_gap_ratio, 0.3);
        assert!(!options.detect_columns);
    }

    #[test]
    fn test_default_options() {
        let options = ExtractOptions::default();
        assert!(options.parallel);
        assert!(options.detect_columns);
        assert_eq!(options.line_tolerance_ratio, 0.3);
    }

    #[test]
    fn test_partial_json() {
        let options: ExtractOptions = serde_json::from_str(r#"{"detect_columns": false}"#).unwrap();
        assert!(!options.detect_columns);
        assert!(options.parallel);
    }
}
