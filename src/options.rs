//! Pipeline configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::PatternRule;
use crate::error::{Error, Result};
use crate::model::{EntityCategory, Rgb};
use crate::parser::ExtractOptions;
use crate::reconcile::OverlapPolicy;

/// Options for a redaction run.
///
/// Every field has a default, so a JSON config only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactOptions {
    /// Entity categories to detect; categories missing from the map are excluded
    pub entity_categories: BTreeMap<EntityCategory, bool>,

    /// Exact-format rules, applied in order
    pub pattern_rules: Vec<PatternRule>,

    /// Fill colour of redaction boxes
    pub redaction_color: Rgb,

    /// Padding added around every box, in page units
    pub redaction_margin: f32,

    /// Vertical centre difference still treated as the same line, in page units
    pub line_band_tolerance: f32,

    /// Which span survives when pattern and entity spans overlap
    pub overlap_policy: OverlapPolicy,

    /// Remove covered glyphs from the content stream, not just paint over them
    pub remove_text: bool,

    /// Process pages in parallel
    pub parallel: bool,

    /// Whole-document time budget in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Layout tuning for text extraction
    pub extract: ExtractOptions,
}

impl RedactOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = |name: &str, v: f32| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!("{} must be a non-negative number, got {}", name, v)))
            }
        };
        finite_non_negative("redaction_margin", self.redaction_margin)?;
        finite_non_negative("line_band_tolerance", self.line_band_tolerance)?;
        finite_non_negative("extract.word_gap_ratio", self.extract.word_gap_ratio)?;
        finite_non_negative("extract.line_tolerance_ratio", self.extract.line_tolerance_ratio)?;

        for (i, rule) in self.pattern_rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("pattern rule {} has an empty name", i)));
            }
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::InvalidConfig("timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }

    /// Enable or disable one entity category.
    pub fn with_category(mut self, category: EntityCategory, enabled: bool) -> Self {
        self.entity_categories.insert(category, enabled);
        self
    }

    /// Enable exactly the given categories.
    pub fn with_categories(mut self, categories: &[EntityCategory]) -> Self {
        self.entity_categories = EntityCategory::ALL
            .iter()
            .map(|c| (*c, categories.contains(c)))
            .collect();
        self
    }

    /// Replace the pattern rules.
    pub fn with_pattern_rules(mut self, rules: Vec<PatternRule>) -> Self {
        self.pattern_rules = rules;
        self
    }

    /// Append a pattern rule.
    pub fn with_pattern_rule(mut self, rule: PatternRule) -> Self {
        self.pattern_rules.push(rule);
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.redaction_color = color;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.redaction_margin = margin;
        self
    }

    pub fn with_line_band_tolerance(mut self, tolerance: f32) -> Self {
        self.line_band_tolerance = tolerance;
        self
    }

    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    /// Only paint boxes; leave the covered text in the content stream.
    pub fn keep_text(mut self) -> Self {
        self.remove_text = false;
        self
    }

    /// Disable parallel processing, for extraction and detection alike.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self.extract.parallel = false;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_extract_options(mut self, extract: ExtractOptions) -> Self {
        self.extract = extract;
        self
    }
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            entity_categories: EntityCategory::ALL.iter().map(|c| (*c, true)).collect(),
            pattern_rules: vec![PatternRule::nric()],
            redaction_color: Rgb::BLACK,
            redaction_margin: 1.0,
            line_band_tolerance: 3.0,
            overlap_policy: OverlapPolicy::SourcePriority,
            remove_text: true,
            parallel: true,
            timeout_ms: None,
            extract: ExtractOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RuleValidator;

    #[test]
    fn test_defaults() {
        let options = RedactOptions::default();
        assert_eq!(options.entity_categories.len(), 5);
        assert!(options.entity_categories.values().all(|on| *on));
        assert_eq!(options.pattern_rules, vec![PatternRule::nric()]);
        assert_eq!(options.redaction_color, Rgb::BLACK);
        assert_eq!(options.redaction_margin, 1.0);
        assert_eq!(options.line_band_tolerance, 3.0);
        assert_eq!(options.overlap_policy, OverlapPolicy::SourcePriority);
        assert!(options.remove_text);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = RedactOptions::new()
            .with_categories(&[EntityCategory::Person])
            .with_pattern_rule(PatternRule::new("phone", r"\b[689]\d{7}\b"))
            .with_color(Rgb(255, 255, 255))
            .with_margin(2.5)
            .keep_text()
            .sequential();

        assert_eq!(options.entity_categories.get(&EntityCategory::Person), Some(&true));
        assert_eq!(options.entity_categories.get(&EntityCategory::Date), Some(&false));
        assert_eq!(options.pattern_rules.len(), 2);
        assert_eq!(options.redaction_margin, 2.5);
        assert!(!options.remove_text);
        assert!(!options.parallel && !options.extract.parallel);
    }

    #[test]
    fn test_partial_json_config() {
        let options = RedactOptions::from_json_str(
            r#"{
                "entity_categories": {"person": true, "date": false},
                "pattern_rules": [{"name": "nric", "pattern": "[STFG]\\d{7}[A-Z]", "validator": "nric_checksum"}],
                "redaction_color": [255, 0, 0],
                "overlap_policy": "longest_span",
                "extract": {"detect_columns": false}
            }"#,
        )
        .unwrap();

        assert_eq!(options.entity_categories.len(), 2);
        assert_eq!(options.pattern_rules[0].validator, Some(RuleValidator::NricChecksum));
        assert_eq!(options.redaction_color, Rgb(255, 0, 0));
        assert_eq!(options.overlap_policy, OverlapPolicy::LongestSpan);
        assert!(!options.extract.detect_columns);
        assert_eq!(options.line_band_tolerance, 3.0);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            RedactOptions::from_json_str("{not json"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            RedactOptions::from_json_str(r#"{"redaction_margin": -1}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            RedactOptions::from_json_str(r#"{"entity_categories": {"weapon": true}}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(RedactOptions::new().with_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nopii.json");
        std::fs::write(&path, r#"{"redaction_margin": 0.5}"#).unwrap();
        assert_eq!(RedactOptions::from_json_file(&path).unwrap().redaction_margin, 0.5);
        assert!(RedactOptions::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
