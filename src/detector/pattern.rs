//! Regex-based detection of exact-format identifiers.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{CandidateSpan, Category, Source};

/// Pattern for Singapore NRIC/FIN numbers.
pub const NRIC_PATTERN: &str = r"\b[STFGM][0-9]{7}[A-Z]\b";

/// A named regular expression whose matches are treated as PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Category name reported for matches (e.g. "nric")
    pub name: String,
    pub pattern: String,
    /// Optional extra check applied to each match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<RuleValidator>,
}

impl PatternRule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            validator: None,
        }
    }

    /// The default NRIC/FIN rule.
    pub fn nric() -> Self {
        Self::new("nric", NRIC_PATTERN)
    }

    pub fn with_validator(mut self, validator: RuleValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Post-match checks available to pattern rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleValidator {
    /// Verify the NRIC/FIN check letter. M-series numbers are accepted on format alone.
    NricChecksum,
}

impl RuleValidator {
    pub fn accepts(&self, matched: &str) -> bool {
        match self {
            RuleValidator::NricChecksum => nric_checksum_ok(matched),
        }
    }
}

/// Check the trailing letter of an NRIC/FIN against its weighted digit sum.
pub fn nric_checksum_ok(id: &str) -> bool {
    const WEIGHTS: [u32; 7] = [2, 7, 6, 5, 4, 3, 2];
    const ST: &[u8; 11] = b"JZIHGFEDCBA";
    const FG: &[u8; 11] = b"XWUTRQPNMLK";

    let bytes = id.as_bytes();
    if bytes.len() != 9 || !bytes[1..8].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let mut sum: u32 = bytes[1..8]
        .iter()
        .zip(WEIGHTS)
        .map(|(d, w)| (d - b'0') as u32 * w)
        .sum();
    if matches!(bytes[0], b'T' | b'G') {
        sum += 4;
    }
    let table = match bytes[0] {
        b'S' | b'T' => ST,
        b'F' | b'G' => FG,
        b'M' => return bytes[8].is_ascii_uppercase(),
        _ => return false,
    };
    table[(sum % 11) as usize] == bytes[8]
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    regex: Regex,
    validator: Option<RuleValidator>,
}

/// Runs every configured rule over a page's linear text.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    rules: Vec<CompiledRule>,
}

impl PatternDetector {
    /// Compile the rules. An invalid pattern is a configuration error.
    pub fn new(rules: &[PatternRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = Regex::new(&rule.pattern).map_err(|e| {
                    Error::InvalidConfig(format!("pattern rule '{}': {}", rule.name, e))
                })?;
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    regex,
                    validator: rule.validator,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// All matches of all rules, tagged with the rule name and `pattern` source.
    ///
    /// Overlaps between rules are left for the reconciler.
    pub fn detect(&self, page: usize, text: &str) -> Vec<CandidateSpan> {
        let mut spans = Vec::new();
        for rule in &self.rules {
            for m in rule.regex.find_iter(text) {
                if rule.validator.is_some_and(|v| !v.accepts(m.as_str())) {
                    continue;
                }
                spans.extend(CandidateSpan::new(
                    page,
                    m.start(),
                    m.end(),
                    Category::Pattern(rule.name.clone()),
                    Source::Pattern,
                    Some(1.0),
                ));
            }
        }
        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }
}
