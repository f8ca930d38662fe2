use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::SeriesStore;

/// Windowed summary over the tail of one series. Derived on demand and
/// replaced wholesale on recompute, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationWindow {
    pub metric_id: String,
    pub window_size: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Full recompute over the last `window_size` samples. Sampling runs at a
/// few Hz at most and windows stay small, so there is no incremental
/// accumulator to keep in sync.
pub fn aggregate(
    store: &SeriesStore,
    metric_id: &str,
    window_size: usize,
) -> Result<AggregationWindow> {
    let window = store.snapshot(metric_id, window_size);
    let values: Vec<f64> = window.iter().filter_map(|s| s.value.as_scalar()).collect();
    if values.is_empty() {
        return Err(Error::InsufficientData(metric_id.to_string()));
    }

    // Stable sort keeps equal values in sample order, so percentile ties
    // resolve to the earliest sample.
    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    Ok(AggregationWindow {
        metric_id: metric_id.to_string(),
        window_size,
        min,
        max,
        mean,
        p50: nearest_rank(&sorted, 50.0),
        p95: nearest_rank(&sorted, 95.0),
    })
}

/// Nearest-rank percentile over an ascending-sorted, non-empty slice.
fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
