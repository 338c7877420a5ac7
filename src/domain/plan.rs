//! Segment boundary planning.

use super::jobs::SegmentDescriptor;

/// Lazy sequence of overlapping segment windows.
///
/// With a known duration the sequence ends once the window start reaches
/// it. Without one every window is `segment_length` long and the sequence
/// never ends on its own, so callers must bound it (see
/// `ServiceConfig::max_segments`).
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    duration: Option<f64>,
    segment_length: f64,
    step: f64,
    next_start: f64,
    next_sequence: u32,
}

/// Plan windows of `segment_length` seconds, each starting
/// `segment_length - overlap` seconds after the previous one.
///
/// The step is clamped to at least one second so an overlap at or above the
/// segment length still makes progress.
pub fn plan(duration: Option<f64>, segment_length: f64, overlap: f64) -> SegmentPlan {
    let duration = duration.filter(|d| d.is_finite() && *d >= 0.0);
    SegmentPlan {
        duration,
        segment_length,
        step: (segment_length - overlap).max(1.0),
        next_start: 0.0,
        next_sequence: 1,
    }
}

impl Iterator for SegmentPlan {
    type Item = SegmentDescriptor;

    fn next(&mut self) -> Option<SegmentDescriptor> {
        let start = self.next_start;
        let length = match self.duration {
            Some(duration) => {
                let remaining = duration - start;
                if remaining <= 0.0 {
                    return None;
                }
                self.segment_length.min(remaining)
            }
            None => self.segment_length,
        };

        let descriptor = SegmentDescriptor {
            sequence: self.next_sequence,
            start,
            length,
        };
        self.next_sequence += 1;
        self.next_start += self.step;
        Some(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(segments: &[SegmentDescriptor]) -> Vec<f64> {
        segments.iter().map(|s| s.start).collect()
    }

    #[test]
    fn thousand_seconds_in_400s_windows() {
        let segments: Vec<_> = plan(Some(1000.0), 400.0, 10.0).collect();
        assert_eq!(starts(&segments), vec![0.0, 390.0, 780.0]);
        assert_eq!(segments[0].length, 400.0);
        assert_eq!(segments[1].length, 400.0);
        assert_eq!(segments[2].length, 220.0);
    }

    #[test]
    fn unknown_duration_yields_fixed_windows_until_bounded() {
        let segments: Vec<_> = plan(None, 400.0, 10.0).take(25).collect();
        assert_eq!(segments.len(), 25);
        assert!(segments.iter().all(|s| s.length == 400.0));
        assert_eq!(segments[24].start, 24.0 * 390.0);
    }

    #[test]
    fn invalid_duration_is_treated_as_unknown() {
        for duration in [f64::NAN, f64::INFINITY, -3.0] {
            let segments: Vec<_> = plan(Some(duration), 60.0, 0.0).take(3).collect();
            assert_eq!(segments.len(), 3);
            assert!(segments.iter().all(|s| s.length == 60.0));
        }
    }

    #[test]
    fn sequences_are_contiguous_from_one() {
        let segments: Vec<_> = plan(Some(3600.0), 300.0, 15.0).collect();
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.sequence as usize, i + 1);
        }
    }

    #[test]
    fn step_is_segment_minus_overlap() {
        for (length, overlap) in [(400u32, 10u32), (60, 0), (30, 29), (1000, 999), (7, 3)] {
            let segments: Vec<_> = plan(Some(5000.0), length as f64, overlap as f64).collect();
            for pair in segments.windows(2) {
                assert_eq!(pair[1].start - pair[0].start, (length - overlap) as f64);
            }
        }
    }

    #[test]
    fn misconfigured_overlap_is_clamped_to_one_second() {
        for (length, overlap) in [(10.0, 10.0), (10.0, 50.0), (1.0, 1.0)] {
            let segments: Vec<_> = plan(Some(20.0), length, overlap).collect();
            assert_eq!(segments.len(), 20);
            for pair in segments.windows(2) {
                assert_eq!(pair[1].start - pair[0].start, 1.0);
            }
        }
    }

    #[test]
    fn known_duration_is_covered_without_gaps() {
        for (duration, length, overlap) in [
            (1000.0, 400.0, 10.0),
            (1200.0, 400.0, 0.0),
            (59.5, 20.0, 5.0),
            (3.0, 400.0, 10.0),
            (901.25, 90.0, 30.0),
        ] {
            let segments: Vec<_> = plan(Some(duration), length, overlap).collect();
            let last = segments.last().unwrap();
            assert!(last.end() >= duration);
            assert!(segments.iter().all(|s| s.start < duration));
            assert!(segments.iter().all(|s| s.length > 0.0));
            assert_eq!(segments[0].start, 0.0);

            for pair in segments.windows(2) {
                // Next window starts inside (or at the end of) the previous one.
                assert!(pair[1].start <= pair[0].end());
                if pair[0].length == length {
                    assert_eq!(pair[0].end() - pair[1].start, overlap);
                }
            }
        }
    }

    #[test]
    fn zero_duration_plans_nothing() {
        assert_eq!(plan(Some(0.0), 400.0, 10.0).count(), 0);
    }

    #[test]
    fn short_source_is_a_single_truncated_segment() {
        let segments: Vec<_> = plan(Some(12.5), 400.0, 10.0).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].length, 12.5);
    }
}
