use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::sensors::MetricSample;

/// Bounded per-metric history: O(1) append, oldest sample evicted at
/// capacity. Timestamps are kept non-decreasing by clamping to the tail if
/// the wall clock steps backwards.
pub struct Series {
    data: VecDeque<MetricSample>,
    capacity: usize,
}

impl Series {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, mut sample: MetricSample) {
        if let Some(last) = self.data.back() {
            if sample.timestamp_ms < last.timestamp_ms {
                sample.timestamp_ms = last.timestamp_ms;
            }
        }
        if self.data.len() >= self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(sample);
    }

    /// At most the last `count` samples, oldest first.
    pub fn tail(&self, count: usize) -> Vec<MetricSample> {
        let skip = self.data.len().saturating_sub(count);
        self.data.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.data.back()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// All metric series, keyed by metric id. The sampler is the sole writer;
/// readers get cloned-out snapshots, so a reader never observes a
/// half-applied append (per-metric isolation, no cross-metric atomicity).
pub struct SeriesStore {
    capacity: usize,
    series: RwLock<HashMap<String, Arc<RwLock<Series>>>>,
}

impl SeriesStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Series are created lazily on the first successful sample, so metrics
    /// that never produce (unavailable sensors) never get a series.
    pub fn append(&self, sample: MetricSample) {
        let series = {
            let map = self.series.read().expect("series map poisoned");
            map.get(&sample.metric_id).cloned()
        };
        let series = match series {
            Some(s) => s,
            None => {
                let mut map = self.series.write().expect("series map poisoned");
                map.entry(sample.metric_id.clone())
                    .or_insert_with(|| Arc::new(RwLock::new(Series::new(self.capacity))))
                    .clone()
            }
        };
        series.write().expect("series poisoned").push(sample);
    }

    /// Point-in-time copy of at most the last `count` samples, oldest first.
    /// Never fails; unseen metrics yield an empty vec.
    pub fn snapshot(&self, metric_id: &str, count: usize) -> Vec<MetricSample> {
        let series = {
            let map = self.series.read().expect("series map poisoned");
            map.get(metric_id).cloned()
        };
        match series {
            Some(s) => s.read().expect("series poisoned").tail(count),
            None => Vec::new(),
        }
    }

    pub fn latest(&self, metric_id: &str) -> Option<MetricSample> {
        let series = {
            let map = self.series.read().expect("series map poisoned");
            map.get(metric_id).cloned()
        };
        series.and_then(|s| s.read().expect("series poisoned").latest().cloned())
    }

    pub fn len(&self, metric_id: &str) -> usize {
        let map = self.series.read().expect("series map poisoned");
        map.get(metric_id)
            .map(|s| s.read().expect("series poisoned").len())
            .unwrap_or(0)
    }
}
