//! End-to-end redaction pipeline.
//!
//! Extraction runs once per document. Pages then fan out for detection,
//! reconciliation and geometry mapping, and the boxes of every page are
//! gathered before the single redaction pass writes the output document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;

use crate::detector::{EntityDetector, EntityRecognizer, LexiconModel, PatternDetector};
use crate::error::{Error, Result};
use crate::geometry::GeometryMapper;
use crate::model::{Document, Page, RedactionBox, ReconciledSpan};
use crate::options::RedactOptions;
use crate::parser::PageLayoutExtractor;
use crate::reconcile::SpanReconciler;
use crate::redact::{RedactStats, Redactor};
use crate::report::{ModelInfo, PageReport, RedactionReport, ReportTotals};

/// Detection results for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysis {
    /// 0-based page index
    pub index: usize,
    /// Non-overlapping spans, sorted by start offset
    pub spans: Vec<ReconciledSpan>,
    pub boxes: Vec<RedactionBox>,
    /// Spans that no token could be found for
    pub unmapped: Vec<ReconciledSpan>,
}

/// Everything detected in a document, before anything is written.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub document: Document,
    pub pages: Vec<PageAnalysis>,
}

impl Analysis {
    /// All boxes of all pages, in page order.
    pub fn boxes(&self) -> Vec<RedactionBox> {
        self.pages.iter().flat_map(|p| p.boxes.iter().copied()).collect()
    }

    pub fn span_count(&self) -> usize {
        self.pages.iter().map(|p| p.spans.len()).sum()
    }

    pub fn unmapped_count(&self) -> usize {
        self.pages.iter().map(|p| p.unmapped.len()).sum()
    }
}

/// A redacted document and its audit report.
#[derive(Debug, Clone)]
pub struct RedactionOutput {
    pub pdf: Vec<u8>,
    pub report: RedactionReport,
}

/// Cancellation flag and deadline, checked between stages and pages.
struct Guard<'a> {
    cancel: Option<&'a AtomicBool>,
    deadline: Option<Instant>,
}

impl<'a> Guard<'a> {
    fn new(cancel: Option<&'a AtomicBool>, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    fn check(&self, stage: &str) -> Result<()> {
        if self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(Error::Aborted(format!("cancelled before {}", stage)));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::Aborted(format!("time budget exceeded before {}", stage)));
        }
        Ok(())
    }
}

/// Configured pipeline, reusable across documents and threads.
///
/// The entity recognizer is built once by the caller and shared; pattern
/// rules are compiled when the pipeline is created.
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: RedactOptions,
    extractor: PageLayoutExtractor,
    patterns: PatternDetector,
    entities: EntityDetector,
    reconciler: SpanReconciler,
    mapper: GeometryMapper,
    redactor: Redactor,
}

impl Pipeline {
    /// Build a pipeline around an already loaded recognizer.
    pub fn new(options: RedactOptions, recognizer: Arc<dyn EntityRecognizer>) -> Result<Self> {
        options.validate()?;
        let patterns = PatternDetector::new(&options.pattern_rules)?;
        let entities = EntityDetector::new(recognizer, options.entity_categories.clone());
        let mut extract = options.extract.clone();
        extract.parallel &= options.parallel;

        Ok(Self {
            extractor: PageLayoutExtractor::new(extract),
            patterns,
            entities,
            reconciler: SpanReconciler::new(options.overlap_policy),
            mapper: GeometryMapper::new(options.line_band_tolerance),
            redactor: Redactor::new(options.redaction_color, options.redaction_margin)
                .with_remove_text(options.remove_text),
            options,
        })
    }

    /// Build a pipeline using the lexicon model shipped with the crate.
    ///
    /// The model is built once per process and shared by every pipeline.
    pub fn with_builtin_model(options: RedactOptions) -> Result<Self> {
        Self::new(options, LexiconModel::shared()?)
    }

    pub fn options(&self) -> &RedactOptions {
        &self.options
    }

    pub fn recognizer(&self) -> &dyn EntityRecognizer {
        self.entities.recognizer()
    }

    /// Detect PII without producing output.
    pub fn analyze(&self, data: &[u8]) -> Result<Analysis> {
        self.analyze_guarded(data, &Guard::new(None, self.timeout()))
    }

    /// Detect and redact all PII in a document.
    pub fn redact(&self, data: &[u8]) -> Result<RedactionOutput> {
        self.redact_guarded(data, &Guard::new(None, self.timeout()))
    }

    /// Like [`redact`](Self::redact), but gives up with [`Error::Aborted`]
    /// once `cancel` is set. No output is returned from a cancelled run.
    pub fn redact_with_cancel(&self, data: &[u8], cancel: &AtomicBool) -> Result<RedactionOutput> {
        self.redact_guarded(data, &Guard::new(Some(cancel), self.timeout()))
    }

    /// Spans, boxes and unmapped spans for one extracted page.
    pub fn analyze_page(&self, page: &Page) -> PageAnalysis {
        let text = page.text();
        let mut candidates = self.patterns.detect(page.index, text);
        candidates.extend(self.entities.detect(page.index, text));
        let spans = self.reconciler.reconcile(candidates);
        let geometry = self.mapper.map_page(page, &spans);

        log::debug!(
            "Page {}: {} spans, {} boxes, {} unmapped",
            page.index,
            spans.len(),
            geometry.boxes.len(),
            geometry.unmapped.len()
        );
        PageAnalysis {
            index: page.index,
            spans,
            boxes: geometry.boxes,
            unmapped: geometry.unmapped,
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.options.timeout_ms.map(Duration::from_millis)
    }

    fn analyze_guarded(&self, data: &[u8], guard: &Guard<'_>) -> Result<Analysis> {
        guard.check("extraction")?;
        let document = self.extractor.extract(data)?;
        guard.check("detection")?;

        let analyze = |page: &Page| -> Result<PageAnalysis> {
            guard.check("detection")?;
            Ok(self.analyze_page(page))
        };
        let pages = if self.options.parallel && document.page_count() > 1 {
            document.pages.par_iter().map(analyze).collect::<Result<Vec<_>>>()?
        } else {
            document.pages.iter().map(analyze).collect::<Result<Vec<_>>>()?
        };

        Ok(Analysis { document, pages })
    }

    fn redact_guarded(&self, data: &[u8], guard: &Guard<'_>) -> Result<RedactionOutput> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let analysis = self.analyze_guarded(data, guard)?;
        let boxes = analysis.boxes();
        guard.check("redaction")?;
        let redacted = self.redactor.redact(data, &boxes)?;
        guard.check("publishing output")?;

        let report = self.report(&analysis, redacted.stats, started_at, clock.elapsed());
        log::info!(
            "Redacted {} spans with {} boxes across {} of {} pages in {} ms",
            report.totals.spans,
            report.totals.boxes,
            report.totals.pages_modified,
            report.page_count,
            report.elapsed_ms
        );
        if report.totals.unmapped > 0 {
            log::warn!("{} detected spans could not be mapped to page geometry", report.totals.unmapped);
        }
        Ok(RedactionOutput {
            pdf: redacted.pdf,
            report,
        })
    }

    fn report(
        &self,
        analysis: &Analysis,
        stats: RedactStats,
        started_at: chrono::DateTime<Utc>,
        elapsed: Duration,
    ) -> RedactionReport {
        let recognizer = self.entities.recognizer();
        let pages: Vec<PageReport> = analysis
            .pages
            .iter()
            .map(|p| PageReport {
                index: p.index,
                spans: p.spans.clone(),
                boxes: p.boxes.len(),
                unmapped: p.unmapped.len(),
            })
            .collect();

        RedactionReport {
            model: ModelInfo {
                name: recognizer.name().to_string(),
                version: recognizer.version().to_string(),
            },
            page_count: analysis.document.page_count(),
            totals: ReportTotals {
                spans: analysis.span_count(),
                boxes: stats.boxes_drawn,
                unmapped: analysis.unmapped_count(),
                pages_modified: stats.pages_modified,
                glyphs_removed: stats.glyphs_removed,
            },
            pages,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}
