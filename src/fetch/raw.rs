//! Backend-shaped query results
//!
//! Mirrors the Prometheus HTTP API envelope:
//!
//! ```json
//! {"status": "success",
//!  "data": {"resultType": "matrix",
//!           "result": [{"metric": {"__name__": "up"}, "values": [[1700000000, "1"]]}]}}
//! ```
//!
//! Samples are kept as raw JSON until normalization, since backends send
//! timestamps as numbers (possibly fractional) and values as strings.

use crate::series::Labels;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A full query response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// "success" or "error"
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: RawData,
    #[serde(default, rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The `data` member of a query response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    /// "matrix" for range queries, "vector" for instant queries
    #[serde(rename = "resultType", default)]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<RawSeries>,
}

/// One series in a query response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub metric: Labels,
    /// Range query shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<RawSample>>,
    /// Instant query shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RawSample>,
}

/// A `[timestamp, value]` pair exactly as the backend sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample(pub Value, pub Value);

impl RawSample {
    /// Build a sample in the backend's wire format (numeric ts, string value)
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self(Value::from(timestamp), Value::String(value.to_string()))
    }

    /// Timestamp coerced to seconds, if numeric
    pub fn timestamp(&self) -> Option<f64> {
        coerce_f64(&self.0).filter(|ts| ts.is_finite())
    }

    /// Value coerced to a float, if numeric
    pub fn value(&self) -> Option<f64> {
        coerce_f64(&self.1)
    }
}

impl RawSeries {
    /// Samples in either response shape
    ///
    /// An empty `values` array falls back to the instant `value`.
    pub fn samples(&self) -> &[RawSample] {
        match (&self.values, &self.value) {
            (Some(values), _) if !values.is_empty() => values.as_slice(),
            (_, Some(value)) => std::slice::from_ref(value),
            _ => &[],
        }
    }
}

impl RawResult {
    /// A successful matrix response holding the given series
    pub fn matrix(result: Vec<RawSeries>) -> Self {
        Self {
            status: "success".to_string(),
            data: RawData {
                result_type: "matrix".to_string(),
                result,
            },
            error_type: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Parse a JSON number or numeric string ("1.5", "NaN", "+Inf")
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
