//! Overlap resolution between pattern and entity spans.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{CandidateSpan, ReconciledSpan};

/// Which span survives when two candidates overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Pattern matches beat entities; within one source the longer span wins.
    #[default]
    SourcePriority,
    /// The longer span wins; pattern matches break length ties.
    LongestSpan,
}

impl OverlapPolicy {
    /// Ordering in which `Greater` means `a` beats `b`.
    fn compare(&self, a: &CandidateSpan, b: &CandidateSpan) -> Ordering {
        let by_source = a.source.rank().cmp(&b.source.rank());
        let by_length = a.len().cmp(&b.len());
        match self {
            OverlapPolicy::SourcePriority => by_source.then(by_length),
            OverlapPolicy::LongestSpan => by_length.then(by_source),
        }
    }
}

/// Merges candidate spans into a non-overlapping set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanReconciler {
    policy: OverlapPolicy,
}

impl SpanReconciler {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Resolve overlaps. Output is sorted by page, then start offset.
    ///
    /// Candidates are swept in start order (longer first on equal starts); each
    /// one is compared with the last kept span and either replaces it or is
    /// dropped whole. A dropped span's non-overlapping remainder is never kept.
    /// Touching spans do not overlap and are both kept.
    pub fn reconcile(&self, mut candidates: Vec<CandidateSpan>) -> Vec<ReconciledSpan> {
        candidates.retain(|c| !c.is_empty());
        candidates.sort_by(|a, b| {
            a.page
                .cmp(&b.page)
                .then(a.start.cmp(&b.start))
                .then(b.len().cmp(&a.len()))
        });

        let mut kept: Vec<CandidateSpan> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match kept.last_mut() {
                Some(last) if last.page == candidate.page && last.overlaps(&candidate) => {
                    if self.policy.compare(&candidate, last) == Ordering::Greater {
                        *last = candidate;
                    }
                }
                _ => kept.push(candidate),
            }
        }

        kept.into_iter().map(ReconciledSpan::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, EntityCategory, Source};

    fn pattern(start: usize, end: usize) -> CandidateSpan {
        CandidateSpan::new(0, start, end, Category::Pattern("nric".into()), Source::Pattern, Some(1.0)).unwrap()
    }

    fn entity(start: usize, end: usize) -> CandidateSpan {
        CandidateSpan::new(0, start, end, Category::Entity(EntityCategory::Person), Source::Entity, None).unwrap()
    }

    fn ranges(spans: &[ReconciledSpan]) -> Vec<(usize, usize, Source)> {
        spans.iter().map(|s| (s.start, s.end, s.source)).collect()
    }

    #[test]
    fn test_pattern_wins_on_identical_text() {
        let spans = SpanReconciler::default().reconcile(vec![entity(23, 32), pattern(23, 32)]);
        assert_eq!(ranges(&spans), vec![(23, 32, Source::Pattern)]);
    }

    #[test]
    fn test_pattern_beats_longer_entity_by_default() {
        let spans = SpanReconciler::default().reconcile(vec![entity(10, 40), pattern(20, 29)]);
        assert_eq!(ranges(&spans), vec![(20, 29, Source::Pattern)]);
    }

    #[test]
    fn test_longest_span_policy() {
        let reconciler = SpanReconciler::new(OverlapPolicy::LongestSpan);
        let spans = reconciler.reconcile(vec![entity(10, 40), pattern(20, 29)]);
        assert_eq!(ranges(&spans), vec![(10, 40, Source::Entity)]);

        // Equal length falls back to source priority
        let spans = reconciler.reconcile(vec![entity(0, 5), pattern(0, 5)]);
        assert_eq!(ranges(&spans), vec![(0, 5, Source::Pattern)]);
    }

    #[test]
    fn test_longer_span_wins_within_source() {
        let spans = SpanReconciler::default().reconcile(vec![entity(8, 12), entity(8, 16), entity(14, 20)]);
        assert_eq!(ranges(&spans), vec![(8, 16, Source::Entity)]);
    }

    #[test]
    fn test_adjacent_spans_kept_and_sorted() {
        let spans = SpanReconciler::default().reconcile(vec![pattern(5, 9), entity(0, 5), entity(9, 12)]);
        assert_eq!(
            ranges(&spans),
            vec![(0, 5, Source::Entity), (5, 9, Source::Pattern), (9, 12, Source::Entity)]
        );
    }

    #[test]
    fn test_no_resurrection_of_remainder() {
        // The entity's tail past the pattern match is not re-added
        let spans = SpanReconciler::default().reconcile(vec![entity(0, 20), pattern(0, 9)]);
        assert_eq!(ranges(&spans), vec![(0, 9, Source::Pattern)]);
    }

    #[test]
    fn test_pages_are_independent() {
        let mut other = entity(0, 5);
        other.page = 1;
        let spans = SpanReconciler::default().reconcile(vec![other, pattern(0, 5)]);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].page, 0);
        assert_eq!(spans[1].page, 1);
    }

    #[test]
    fn test_output_never_overlaps() {
        let candidates = vec![
            entity(0, 10),
            pattern(3, 6),
            entity(5, 15),
            pattern(14, 18),
            entity(17, 30),
            entity(29, 31),
        ];
        for policy in [OverlapPolicy::SourcePriority, OverlapPolicy::LongestSpan] {
            let spans = SpanReconciler::new(policy).reconcile(candidates.clone());
            for pair in spans.windows(2) {
                assert!(pair[0].end <= pair[1].start, "{:?}", pair);
            }
        }
    }
}
