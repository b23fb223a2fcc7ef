//! Statistical fallback estimator
//!
//! Used whenever the generative step is disabled or fails. Looks at the
//! tail of the recent points only:
//! - trend from the first/last delta (±0.05 dead band)
//! - z-score of the last value against the tail's mean and std
//! - `|z| > 2` is reported as medium risk

use crate::series::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

const TREND_DEAD_BAND: f64 = 0.05;
const Z_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Normal,
    Medium,
    /// No data to judge
    Unknown,
}

/// Result of the fallback estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalAnalysis {
    pub title: String,
    pub level: RiskLevel,
    pub trend: Trend,
    pub current_status: String,
    pub baseline: String,
    pub current_value: Option<f64>,
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
    pub sample_count: usize,
    pub analysis: String,
    pub action: String,
    /// Why the generative analysis was not used
    pub reason: String,
}

/// Trend and z-score over the most recent points
#[derive(Debug, Clone)]
pub struct FallbackEstimator {
    tail: usize,
}

impl Default for FallbackEstimator {
    fn default() -> Self {
        Self { tail: 200 }
    }
}

impl FallbackEstimator {
    pub fn new(tail: usize) -> Self {
        Self { tail: tail.max(1) }
    }

    pub fn estimate(&self, metric_name: &str, points: &[Point], reason: &str) -> StatisticalAnalysis {
        let start = points.len().saturating_sub(self.tail);
        let values: Vec<f64> = points[start..].iter().map(|p| p.value).collect();

        let (first, last) = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return StatisticalAnalysis {
                    title: format!("No data for {}", metric_name),
                    level: RiskLevel::Unknown,
                    trend: Trend::Stable,
                    current_status: "no data".to_string(),
                    baseline: String::new(),
                    current_value: None,
                    mean: 0.0,
                    std: 0.0,
                    z_score: 0.0,
                    sample_count: 0,
                    analysis: "Unable to retrieve data".to_string(),
                    action: "Check that the metric is being scraped".to_string(),
                    reason: reason.to_string(),
                };
            }
        };

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let z_score = (last - mean) / (std + 1e-9);

        let diff = last - first;
        let trend = if diff > TREND_DEAD_BAND {
            Trend::Rising
        } else if diff < -TREND_DEAD_BAND {
            Trend::Falling
        } else {
            Trend::Stable
        };

        let level = if z_score.abs() > Z_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Normal
        };

        StatisticalAnalysis {
            title: format!("{} statistical analysis", metric_name),
            level,
            trend,
            current_status: format!("current value {:.2}, trend {}", last, trend),
            baseline: format!("mean {:.2}", mean),
            current_value: Some(last),
            mean,
            std,
            z_score,
            sample_count: values.len(),
            analysis: "Generative analysis unavailable; statistical estimate only.".to_string(),
            action: "Check the generative analysis service".to_string(),
            reason: reason.to_string(),
        }
    }
}
