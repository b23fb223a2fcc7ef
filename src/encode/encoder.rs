//! Segment to vector encoding
//!
//! Maps a variable-length, irregularly sampled segment onto `dim` evenly
//! spaced positions over its own time span, then standardizes. The result
//! depends only on the segment's shape, so segments of different magnitude
//! or offset land near each other in L2 space.

use crate::encode::vector::FeatureVector;
use crate::series::Point;
use serde::{Deserialize, Serialize};

/// Guards the time rescale and the standardization divisor
const EPSILON: f64 = 1e-9;

/// Encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Output dimension; must match the vector index
    pub dim: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { dim: 128 }
    }
}

/// Deterministic, stateless segment encoder
#[derive(Debug, Clone, Default)]
pub struct VectorEncoder {
    config: EncoderConfig,
}

impl VectorEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn dim(&self) -> usize {
        self.config.dim
    }

    /// Encode `points` into exactly `dim` components
    ///
    /// NaN and infinite samples are dropped first. Degenerate inputs then
    /// take escape paths instead of failing:
    /// - no finite points: the zero vector
    /// - every point at one timestamp: the mean value repeated
    /// - every value equal (zero variance): the mean value repeated
    pub fn encode(&self, points: &[Point]) -> FeatureVector {
        let dim = self.config.dim;
        let mut sorted: Vec<Point> = points
            .iter()
            .filter(|p| p.value.is_finite())
            .copied()
            .collect();
        if sorted.is_empty() {
            return FeatureVector::zeros(dim);
        }

        sorted.sort_by_key(|p| p.timestamp);

        let xs: Vec<f64> = sorted.iter().map(|p| p.timestamp as f64).collect();
        let ys: Vec<f64> = sorted.iter().map(|p| p.value).collect();

        let (x_min, x_max) = min_max(&xs);
        let (y_min, y_max) = min_max(&ys);
        if x_max == x_min || y_max == y_min {
            return FeatureVector::constant(mean(&ys) as f32, dim);
        }

        let span = x_max - x_min + EPSILON;
        let xs: Vec<f64> = xs.iter().map(|x| (x - x_min) / span).collect();

        let resampled: Vec<f64> = linspace(0.0, 1.0, dim)
            .into_iter()
            .map(|t| interp(t, &xs, &ys))
            .collect();

        let mu = mean(&resampled);
        let sigma = std_dev(&resampled, mu) + EPSILON;

        FeatureVector(
            resampled
                .iter()
                .map(|v| ((v - mu) / sigma) as f32)
                .collect(),
        )
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// `n` evenly spaced values over `[start, end]`, endpoints included
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Piecewise-linear interpolation at `x`, clamped to the end values
///
/// `xp` must be non-decreasing and the same length as `fp`.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let idx = xp.partition_point(|&v| v <= x);
    if idx == 0 {
        return fp[0];
    }
    if idx == xp.len() {
        return fp[xp.len() - 1];
    }

    let (x0, x1) = (xp[idx - 1], xp[idx]);
    let (y0, y1) = (fp[idx - 1], fp[idx]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
