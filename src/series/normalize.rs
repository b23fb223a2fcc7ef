//! Series Normalizer
//!
//! Converts a backend response into `Series` values: label-set plus points
//! sorted by timestamp, one point per timestamp.

use crate::fetch::{RawResult, RawSeries};
use crate::series::types::{Point, Series, SeriesKey};
use thiserror::Error;

/// Errors raised while extracting series from a raw result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// A sample whose timestamp or value is not numeric
    #[error("Malformed {field} in sample {index} of series {series}: {raw}")]
    MalformedSample {
        series: String,
        index: usize,
        field: &'static str,
        raw: String,
    },
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Extract every series of a raw result
///
/// Fails on the first malformed sample; a series is never returned with a
/// sample silently dropped or zeroed.
pub fn to_series(raw: &RawResult) -> NormalizeResult<Vec<Series>> {
    raw.data.result.iter().map(normalize_series).collect()
}

/// Extract one series, accepting both range (`values`) and instant (`value`) shapes
pub fn normalize_series(item: &RawSeries) -> NormalizeResult<Series> {
    let samples = item.samples();
    let mut points = Vec::with_capacity(samples.len());

    for (index, sample) in samples.iter().enumerate() {
        let timestamp = sample
            .timestamp()
            .ok_or_else(|| malformed(item, index, "timestamp", &sample.0))?;
        let value = sample
            .value()
            .ok_or_else(|| malformed(item, index, "value", &sample.1))?;

        // Sub-second precision is truncated to whole seconds
        points.push(Point::new(timestamp.trunc() as i64, value));
    }

    Ok(Series::new(item.metric.clone(), order_points(points)))
}

/// Sort by timestamp, resolving duplicates to the later-arriving sample
pub fn order_points(mut points: Vec<Point>) -> Vec<Point> {
    // Stable sort keeps arrival order among equal timestamps
    points.sort_by_key(|p| p.timestamp);

    let mut ordered: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        match ordered.last_mut() {
            Some(last) if last.timestamp == point.timestamp => *last = point,
            _ => ordered.push(point),
        }
    }
    ordered
}

fn malformed(
    item: &RawSeries,
    index: usize,
    field: &'static str,
    raw: &serde_json::Value,
) -> NormalizeError {
    NormalizeError::MalformedSample {
        series: SeriesKey::from_labels(&item.metric).to_string(),
        index,
        field,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RawSample;
    use crate::series::Labels;
    use serde_json::json;

    fn labels(name: &str) -> Labels {
        let mut labels = Labels::new();
        labels.insert("__name__".to_string(), name.to_string());
        labels
    }

    #[test]
    fn test_range_shape() {
        let raw = RawResult::matrix(vec![RawSeries {
            metric: labels("up"),
            values: Some(vec![
                RawSample(json!(1700000000.9), json!("1")),
                RawSample(json!("1700000060"), json!("0.5")),
            ]),
            value: None,
        }]);

        let series = to_series(&raw).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0].points,
            vec![Point::new(1700000000, 1.0), Point::new(1700000060, 0.5)]
        );
    }

    #[test]
    fn test_instant_shape() {
        let raw = RawResult::matrix(vec![RawSeries {
            metric: labels("up"),
            values: None,
            value: Some(RawSample(json!(1700000000), json!("3"))),
        }]);

        let series = to_series(&raw).unwrap();
        assert_eq!(series[0].points, vec![Point::new(1700000000, 3.0)]);
    }

    #[test]
    fn test_malformed_value_fails_extraction() {
        let raw = RawResult::matrix(vec![RawSeries {
            metric: labels("up"),
            values: Some(vec![
                RawSample(json!(1), json!("1")),
                RawSample(json!(2), json!("not-a-number")),
            ]),
            value: None,
        }]);

        let err = to_series(&raw).unwrap_err();
        match err {
            NormalizeError::MalformedSample { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "value");
            }
        }
    }

    #[test]
    fn test_malformed_timestamp_fails_extraction() {
        let raw = RawResult::matrix(vec![RawSeries {
            metric: labels("up"),
            values: Some(vec![RawSample(json!(null), json!("1"))]),
            value: None,
        }]);

        assert!(matches!(
            to_series(&raw),
            Err(NormalizeError::MalformedSample { field: "timestamp", .. })
        ));
    }

    #[test]
    fn test_duplicates_keep_later_sample() {
        let points = vec![
            Point::new(120, 2.0),
            Point::new(60, 1.0),
            Point::new(120, 9.0),
        ];
        let ordered = order_points(points);
        assert_eq!(ordered, vec![Point::new(60, 1.0), Point::new(120, 9.0)]);
    }

    #[test]
    fn test_series_without_samples() {
        let raw = RawResult::matrix(vec![RawSeries {
            metric: labels("up"),
            values: None,
            value: None,
        }]);

        let series = to_series(&raw).unwrap();
        assert!(series[0].is_empty());
    }
}
