//! Detected text spans.

use serde::{Deserialize, Serialize};

/// Generic entity categories produced by the entity recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// People's names
    Person,
    /// Companies, agencies, institutions
    Organization,
    /// Geo-political entities: countries, cities, states
    Gpe,
    /// Non-GPE locations: mountains, bodies of water, landmarks
    Location,
    /// Absolute or relative dates
    Date,
}

impl EntityCategory {
    /// All categories, in a stable order.
    pub const ALL: [EntityCategory; 5] = [
        EntityCategory::Person,
        EntityCategory::Organization,
        EntityCategory::Gpe,
        EntityCategory::Location,
        EntityCategory::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Person => "person",
            EntityCategory::Organization => "organization",
            EntityCategory::Gpe => "gpe",
            EntityCategory::Location => "location",
            EntityCategory::Date => "date",
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category tag carried by a span: an entity category or a pattern rule label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Category {
    Entity(EntityCategory),
    Pattern(String),
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Entity(c) => c.fmt(f),
            Category::Pattern(label) => f.write_str(label),
        }
    }
}

impl From<EntityCategory> for Category {
    fn from(c: EntityCategory) -> Self {
        Category::Entity(c)
    }
}

/// Which detector produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Exact-format regular expression rule
    Pattern,
    /// Statistical / lexicon entity recognizer
    Entity,
}

impl Source {
    /// Overlap priority; higher wins.
    pub fn rank(&self) -> u8 {
        match self {
            Source::Pattern => 1,
            Source::Entity => 0,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Pattern => f.write_str("pattern"),
            Source::Entity => f.write_str("entity"),
        }
    }
}

/// A detector's proposal that `[start, end)` of a page's linear text is PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpan {
    /// 0-based page index
    pub page: usize,
    pub start: usize,
    pub end: usize,
    pub category: Category,
    pub source: Source,
    pub confidence: Option<f32>,
}

impl CandidateSpan {
    /// Create a span; returns `None` unless `start < end`.
    pub fn new(
        page: usize,
        start: usize,
        end: usize,
        category: Category,
        source: Source,
        confidence: Option<f32>,
    ) -> Option<Self> {
        (start < end).then_some(Self {
            page,
            start,
            end,
            category,
            source,
            confidence,
        })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the two offset ranges intersect. Touching ranges do not.
    pub fn overlaps(&self, other: &CandidateSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The covered slice of `text`, if the offsets are valid for it.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// A span that survived overlap resolution. Spans of one page never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledSpan {
    pub page: usize,
    pub start: usize,
    pub end: usize,
    pub category: Category,
    pub source: Source,
    pub confidence: Option<f32>,
}

impl ReconciledSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

impl From<CandidateSpan> for ReconciledSpan {
    fn from(c: CandidateSpan) -> Self {
        Self {
            page: c.page,
            start: c.start,
            end: c.end,
            category: c.category,
            source: c.source,
            confidence: c.confidence,
        }
    }
}
