//! Generic named-entity detection through a swappable recognizer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{CandidateSpan, Category, EntityCategory, Source};

/// An entity found by a recognizer, as byte offsets into the text it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEntity {
    pub start: usize,
    pub end: usize,
    pub category: EntityCategory,
    pub confidence: Option<f32>,
}

impl RecognizedEntity {
    pub fn new(start: usize, end: usize, category: EntityCategory) -> Self {
        Self {
            start,
            end,
            category,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A named-entity recognition model.
///
/// Implementations are loaded once per process and shared read-only between
/// documents and worker threads.
pub trait EntityRecognizer: Send + Sync {
    /// Model name reported in redaction reports.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Recognize entities in `text`. Offsets are UTF-8 byte offsets into `text`.
    fn recognize(&self, text: &str) -> Vec<RecognizedEntity>;
}

/// Applies a recognizer to page text and filters by enabled category.
#[derive(Clone)]
pub struct EntityDetector {
    recognizer: Arc<dyn EntityRecognizer>,
    categories: BTreeMap<EntityCategory, bool>,
}

impl EntityDetector {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, categories: BTreeMap<EntityCategory, bool>) -> Self {
        Self {
            recognizer,
            categories,
        }
    }

    pub fn recognizer(&self) -> &dyn EntityRecognizer {
        self.recognizer.as_ref()
    }

    /// Whether a category is enabled. Categories missing from the map are excluded.
    pub fn is_enabled(&self, category: EntityCategory) -> bool {
        self.categories.get(&category).copied().unwrap_or(false)
    }

    /// Entity spans of enabled categories with valid offsets.
    pub fn detect(&self, page: usize, text: &str) -> Vec<CandidateSpan> {
        if text.is_empty() || !EntityCategory::ALL.iter().any(|c| self.is_enabled(*c)) {
            return Vec::new();
        }

        let mut spans = Vec::new();
        for entity in self.recognizer.recognize(text) {
            if !self.is_enabled(entity.category) {
                continue;
            }
            let valid = entity.start < entity.end
                && entity.end <= text.len()
                && text.is_char_boundary(entity.start)
                && text.is_char_boundary(entity.end);
            if !valid {
                log::warn!(
                    "Dropping {} entity with invalid offsets {}..{} on page {}",
                    entity.category,
                    entity.start,
                    entity.end,
                    page
                );
                continue;
            }
            spans.extend(CandidateSpan::new(
                page,
                entity.start,
                entity.end,
                Category::Entity(entity.category),
                Source::Entity,
                entity.confidence,
            ));
        }
        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }
}

impl std::fmt::Debug for EntityDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDetector")
            .field("model", &self.recognizer.name())
            .field("categories", &self.categories)
            .finish()
    }
}
