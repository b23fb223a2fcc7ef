//! Chunk Merger
//!
//! Folds per-chunk range results into one response, grouping series by
//! canonical label-set. Samples are merged by timestamp rather than appended,
//! so the output is time-ordered regardless of chunk arrival order, and the
//! seam sample shared by two adjacent chunks appears once. On equal
//! timestamps the chunk absorbed later wins.

use crate::fetch::raw::{RawResult, RawSample, RawSeries};
use crate::series::{Labels, SeriesKey};
use std::collections::{BTreeMap, HashMap};

/// Accumulates chunk results keyed by series identity
#[derive(Debug, Default)]
pub struct ChunkMerger {
    /// First-seen order of series keys
    order: Vec<SeriesKey>,
    series: HashMap<SeriesKey, MergedSeries>,
}

#[derive(Debug)]
struct MergedSeries {
    labels: Labels,
    /// Samples keyed by timestamp in milliseconds
    samples: BTreeMap<i64, RawSample>,
    /// Samples whose timestamp is not numeric; kept so normalization reports them
    unparsed: Vec<RawSample>,
}

impl MergedSeries {
    fn new(labels: Labels) -> Self {
        Self {
            labels,
            samples: BTreeMap::new(),
            unparsed: Vec::new(),
        }
    }

    fn absorb(&mut self, samples: &[RawSample]) {
        for sample in samples {
            match sample.timestamp() {
                Some(ts) => {
                    self.samples.insert((ts * 1000.0).round() as i64, sample.clone());
                }
                None => self.unparsed.push(sample.clone()),
            }
        }
    }

    fn into_raw(self) -> RawSeries {
        let mut values: Vec<RawSample> = self.samples.into_values().collect();
        values.extend(self.unparsed);
        RawSeries {
            metric: self.labels,
            values: Some(values),
            value: None,
        }
    }
}

impl ChunkMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chunk's result
    pub fn absorb(&mut self, chunk: RawResult) {
        for item in chunk.data.result {
            let key = SeriesKey::from_labels(&item.metric);
            if !self.series.contains_key(&key) {
                self.order.push(key.clone());
            }
            self.series
                .entry(key)
                .or_insert_with(|| MergedSeries::new(item.metric.clone()))
                .absorb(item.samples());
        }
    }

    /// Number of distinct series seen so far
    pub fn series_count(&self) -> usize {
        self.order.len()
    }

    /// Produce the merged matrix response
    pub fn finish(mut self) -> RawResult {
        let result = self
            .order
            .iter()
            .filter_map(|key| self.series.remove(key))
            .map(MergedSeries::into_raw)
            .collect();
        RawResult::matrix(result)
    }
}
