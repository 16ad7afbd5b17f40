use tracing::debug;

use super::RawSpan;

/// A final, merged time range scheduled for redaction.
///
/// Within a merged list, intervals are disjoint, separated by more than the
/// merge gap, and sorted ascending by `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedactionInterval {
    pub start: f64,
    pub end: f64,
}

impl RedactionInterval {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Tunable merge parameters.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Spans closer together than this are coalesced into one interval, so
    /// a value spoken across a short pause is destroyed in one piece.
    pub max_gap: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { max_gap: 1.0 }
    }
}

/// Coalesce raw spans into a minimal ordered set of redaction intervals.
///
/// Spans are stably sorted by `start`, then folded left to right: a span
/// starting within `max_gap` of the current interval's end extends it,
/// anything further away starts a new interval. The pattern kind is
/// discarded; redaction downstream is content-agnostic.
pub fn merge(spans: &[RawSpan], cfg: &MergeConfig) -> Vec<RedactionInterval> {
    let intervals: Vec<RedactionInterval> = spans
        .iter()
        .map(|s| RedactionInterval {
            start: s.start,
            end: s.end,
        })
        .collect();
    let merged = merge_intervals(&intervals, cfg);

    debug!(
        "Merged {} spans into {} intervals",
        spans.len(),
        merged.len()
    );

    merged
}

/// Sort-and-coalesce over bare intervals. Idempotent: an already-merged list
/// comes back unchanged.
pub fn merge_intervals(
    intervals: &[RedactionInterval],
    cfg: &MergeConfig,
) -> Vec<RedactionInterval> {
    if intervals.is_empty() {
        return Vec::new();
    }

    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut merged = Vec::new();
    let mut current = sorted[0];

    for iv in &sorted[1..] {
        if iv.start <= current.end + cfg.max_gap {
            current.end = current.end.max(iv.end);
        } else {
            merged.push(current);
            current = *iv;
        }
    }
    merged.push(current);

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::PatternKind;

    fn span(start: f64, end: f64) -> RawSpan {
        RawSpan {
            start,
            end,
            kind: PatternKind::Ssn,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(&[], &MergeConfig::default()).is_empty());
    }

    #[test]
    fn test_single_span_unchanged() {
        let intervals = merge(&[span(3.0, 5.0)], &MergeConfig::default());
        assert_eq!(intervals, vec![RedactionInterval { start: 3.0, end: 5.0 }]);
    }

    #[test]
    fn test_gap_within_threshold_merges() {
        // 0.5s gap <= 1.0s: one interval
        let intervals = merge(
            &[span(10.0, 12.0), span(12.5, 13.0)],
            &MergeConfig::default(),
        );
        assert_eq!(
            intervals,
            vec![RedactionInterval {
                start: 10.0,
                end: 13.0
            }]
        );
    }

    #[test]
    fn test_gap_beyond_threshold_stays_split() {
        // 2.0s gap > 1.0s: two intervals
        let intervals = merge(
            &[span(10.0, 12.0), span(14.0, 15.0)],
            &MergeConfig::default(),
        );
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0], RedactionInterval { start: 10.0, end: 12.0 });
        assert_eq!(intervals[1], RedactionInterval { start: 14.0, end: 15.0 });
    }

    #[test]
    fn test_unsorted_input_sorted_output() {
        let intervals = merge(
            &[span(20.0, 21.0), span(0.0, 1.0), span(10.0, 11.0)],
            &MergeConfig::default(),
        );
        assert_eq!(intervals.len(), 3);
        assert!(intervals.windows(2).all(|w| w[0].end < w[1].start));
    }

    #[test]
    fn test_contained_span_absorbed() {
        let intervals = merge(
            &[span(0.0, 10.0), span(2.0, 3.0)],
            &MergeConfig::default(),
        );
        assert_eq!(intervals, vec![RedactionInterval { start: 0.0, end: 10.0 }]);
    }

    #[test]
    fn test_every_input_covered() {
        let spans = vec![
            span(5.0, 6.0),
            span(0.0, 2.0),
            span(6.5, 8.0),
            span(1.5, 3.0),
            span(20.0, 22.0),
        ];
        let intervals = merge(&spans, &MergeConfig::default());

        for s in &spans {
            assert!(
                intervals
                    .iter()
                    .any(|iv| iv.start <= s.start && s.end <= iv.end),
                "span {:?} not covered",
                s
            );
        }
    }

    #[test]
    fn test_idempotent() {
        let spans = vec![span(0.0, 2.0), span(2.5, 4.0), span(10.0, 11.0)];
        let cfg = MergeConfig::default();
        let once = merge(&spans, &cfg);
        let twice = merge_intervals(&once, &cfg);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_gap() {
        let cfg = MergeConfig { max_gap: 3.0 };
        let intervals = merge(&[span(10.0, 12.0), span(14.0, 15.0)], &cfg);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0], RedactionInterval { start: 10.0, end: 15.0 });
    }

    #[test]
    fn test_interval_duration() {
        assert!((RedactionInterval { start: 1.0, end: 2.5 }.duration() - 1.5).abs() < 1e-9);
        assert_eq!(RedactionInterval { start: 2.0, end: 1.0 }.duration(), 0.0);
    }
}
