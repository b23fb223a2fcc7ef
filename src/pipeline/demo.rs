//! Synthetic data for running without a metrics backend

use crate::series::{Point, Segment};

/// 24 hourly segments of 60 one-minute points ending at `now`
///
/// Values follow a 10-minute saw-tooth between 0.5 and 0.86. Every 7th hour
/// (counting back from `now`) carries a +1.0 bump on minutes 21 to 29.
pub fn demo_segments(now: i64) -> Vec<Segment> {
    (0..24)
        .map(|hour| {
            let base = now - hour * 3600;
            let mut points: Vec<Point> = (0..60)
                .map(|minute| {
                    let mut value = 0.5 + 0.4 * (minute % 10) as f64 / 10.0;
                    if hour % 7 == 0 && minute > 20 && minute < 30 {
                        value += 1.0;
                    }
                    Point::new(base - minute * 60, value)
                })
                .collect();
            points.reverse();
            Segment::new(points)
        })
        .collect()
}

/// One hour of recent points with a level shift 10 minutes in
pub fn demo_recent_points(now: i64) -> Vec<Point> {
    let mut points: Vec<Point> = (0..60)
        .map(|i| {
            let shift = if i > 10 { 10.0 } else { 0.0 };
            Point::new(now - i * 60, 50.0 + i as f64 * 0.1 + shift)
        })
        .collect();
    points.reverse();
    points
}
