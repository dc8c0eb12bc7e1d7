//! Audit report for a redaction run.
//!
//! Reports carry offsets and categories only; the detected text itself never
//! leaves the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ReconciledSpan;

/// Identity of the entity model used for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
}

/// What happened on one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// 0-based page index
    pub index: usize,
    pub spans: Vec<ReconciledSpan>,
    /// Rectangles drawn on the page
    pub boxes: usize,
    /// Spans detected but not resolvable to any token
    pub unmapped: usize,
}

/// Run-level totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub spans: usize,
    /// Boxes painted; a box entirely outside the MediaBox is not
    pub boxes: usize,
    pub unmapped: usize,
    pub pages_modified: usize,
    pub glyphs_removed: usize,
}

/// Summary of one redaction run.
#[derive(Debug, Clone, Serialize)]
pub struct RedactionReport {
    pub model: ModelInfo,
    pub page_count: usize,
    pub pages: Vec<PageReport>,
    pub totals: ReportTotals,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RedactionReport {
    /// Pages on which anything was detected.
    pub fn pages_with_findings(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| !p.spans.is_empty())
    }

    /// Whether every detected span was mapped to a box.
    pub fn is_complete(&self) -> bool {
        self.totals.unmapped == 0
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Redaction(e.to_string()))
    }
}
