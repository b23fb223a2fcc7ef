//! Core series types
//!
//! - `Point`: one timestamp/value sample
//! - `Labels` and `SeriesKey`: the identifying dimensions of a series
//! - `Series`: a label-set with its ordered points
//! - `Segment`: a bounded window of one series, the unit that gets indexed

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label dimensions of one concrete series (`__name__`, `instance`, `job`, ...)
pub type Labels = BTreeMap<String, String>;

/// A single sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Sampled value
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl From<(i64, f64)> for Point {
    fn from((timestamp, value): (i64, f64)) -> Self {
        Self { timestamp, value }
    }
}

/// Canonical identity of a label-set
///
/// Holds the key/value pairs sorted, so two label-sets compare equal iff
/// they contain the same pairs regardless of the order the backend sent them
/// in. Pairs are kept structured rather than joined into a string, so label
/// values containing separators cannot collide.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey(Vec<(String, String)>);

impl SeriesKey {
    /// Build a key from any iterator of label pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        pairs.sort();
        pairs.dedup();
        Self(pairs)
    }

    /// Build a key from a label map
    pub fn from_labels(labels: &Labels) -> Self {
        Self::from_pairs(labels.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Sorted label pairs
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Value of the `__name__` label, if present
    pub fn metric_name(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == "__name__")
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:?}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// A label-set plus its time-ordered points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: Labels,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(labels: Labels, points: Vec<Point>) -> Self {
        Self { labels, points }
    }

    /// Canonical grouping key for this series
    pub fn key(&self) -> SeriesKey {
        SeriesKey::from_labels(&self.labels)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// A contiguous slice of one series spanning a bounded window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<Point>,
}

impl Segment {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Timestamp of the first point (0 for an empty segment)
    pub fn start_ts(&self) -> i64 {
        self.points.first().map(|p| p.timestamp).unwrap_or(0)
    }

    /// Timestamp of the last point (0 for an empty segment)
    pub fn end_ts(&self) -> i64 {
        self.points.last().map(|p| p.timestamp).unwrap_or(0)
    }

    /// Wall-clock span in seconds
    pub fn duration(&self) -> i64 {
        self.end_ts() - self.start_ts()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
