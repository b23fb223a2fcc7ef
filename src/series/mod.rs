//! Series Model
//!
//! In-memory representation of time series and the two transforms that
//! operate on it before vectorization:
//!
//! - **types**: `Point`, `Labels`, `SeriesKey`, `Series`, `Segment`
//! - **normalize**: raw backend result → ordered `Series`
//! - **segment**: `Series` points → bounded `Segment` windows
//!
//! ```text
//! RawResult → to_series → Series → Segmenter → Segment (→ VectorEncoder)
//! ```

pub mod normalize;
pub mod segment;
pub mod types;

pub use normalize::{normalize_series, order_points, to_series, NormalizeError, NormalizeResult};
pub use segment::{SegmentConfig, Segmenter};
pub use types::{Labels, Point, Segment, Series, SeriesKey};
