//! Fixed-length feature vectors

use serde::{Deserialize, Serialize};

/// A fixed-dimension f32 embedding of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub Vec<f32>);

impl FeatureVector {
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    /// `value` repeated `dim` times
    pub fn constant(value: f32, dim: usize) -> Self {
        Self(vec![value; dim])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance; `None` when dimensions differ
    pub fn l2_distance(&self, other: &FeatureVector) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        let sum: f32 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
