//! PII detectors.
//!
//! Two independent sources propose candidate spans over a page's linear text:
//! exact-format regex rules and a swappable named-entity recognizer.

mod entity;
mod lexicon;
mod pattern;

pub use entity::{EntityDetector, EntityRecognizer, RecognizedEntity};
pub use lexicon::LexiconModel;
pub use pattern::{nric_checksum_ok, PatternDetector, PatternRule, RuleValidator, NRIC_PATTERN};
