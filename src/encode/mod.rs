//! Segment encoding into fixed-dimension feature vectors

mod encoder;
mod vector;

pub use encoder::{EncoderConfig, VectorEncoder};
pub use vector::FeatureVector;
