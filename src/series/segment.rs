//! Segmenter
//!
//! Splits an ordered point sequence into bounded windows. Windows shorter
//! than `min_points` are dropped, so segments do not necessarily cover the
//! whole input.

use crate::series::types::{Point, Segment};

/// Windowing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Maximum span of a segment in seconds (inclusive)
    pub window_seconds: i64,
    /// Minimum number of points for a window to be kept
    pub min_points: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3600,
            min_points: 4,
        }
    }
}

/// Splits series into fixed-duration segments
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmentConfig,
}

impl Segmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Segment time-ordered points in a single pass
    ///
    /// A window opens at the first point and accepts every point with
    /// `ts - start <= window_seconds`. The first point past the window closes
    /// it and opens the next one.
    pub fn segment(&self, points: &[Point]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let Some(first) = points.first() else {
            return segments;
        };

        let mut window_start = first.timestamp;
        let mut current: Vec<Point> = Vec::new();

        for point in points {
            if point.timestamp - window_start <= self.config.window_seconds {
                current.push(*point);
                continue;
            }

            let closed = std::mem::replace(&mut current, vec![*point]);
            if closed.len() >= self.config.min_points {
                segments.push(Segment::new(closed));
            }
            window_start = point.timestamp;
        }

        if current.len() >= self.config.min_points {
            segments.push(Segment::new(current));
        }

        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutely(count: i64, start: i64) -> Vec<Point> {
        (0..count)
            .map(|i| Point::new(start + i * 60, i as f64))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let segmenter = Segmenter::default();
        assert!(segmenter.segment(&[]).is_empty());
    }

    #[test]
    fn test_two_hours_of_minutely_points() {
        let points = minutely(120, 1_700_000_000);
        let segments = Segmenter::default().segment(&points);

        assert_eq!(segments.len(), 2);
        // Inclusive boundary: minutes 0..=60 land in the first window
        assert_eq!(segments[0].len(), 61);
        assert_eq!(segments[1].len(), 59);
        assert_eq!(segments[0].duration(), 3600);
    }

    #[test]
    fn test_short_windows_are_discarded() {
        // Three points, a long gap, then five points
        let mut points = vec![Point::new(0, 1.0), Point::new(10, 1.0), Point::new(20, 1.0)];
        points.extend((0..5).map(|i| Point::new(10_000 + i * 10, 2.0)));

        let segments = Segmenter::default().segment(&points);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_ts(), 10_000);
    }

    #[test]
    fn test_trailing_window_below_minimum_is_dropped() {
        let mut points = minutely(61, 0);
        points.push(Point::new(7200, 1.0));
        points.push(Point::new(7260, 1.0));

        let segments = Segmenter::default().segment(&points);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 61);
    }

    #[test]
    fn test_coverage_invariants() {
        let config = SegmentConfig {
            window_seconds: 900,
            min_points: 3,
        };
        // Irregular spacing with gaps
        let mut points = Vec::new();
        let mut ts = 0;
        for i in 0..500 {
            ts += 30 + (i * 37 % 200);
            points.push(Point::new(ts, (i % 13) as f64));
        }

        let segments = Segmenter::new(config).segment(&points);
        assert!(!segments.is_empty());

        let mut previous_end = i64::MIN;
        for seg in &segments {
            assert!(seg.duration() <= config.window_seconds);
            assert!(seg.len() >= config.min_points);
            assert!(seg.start_ts() > previous_end);
            assert!(seg.points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            previous_end = seg.end_ts();
        }
    }
}
