use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::aggregate;
use crate::derived::{DerivedReport, HostInfo};
use crate::error::{Error, Result};
use crate::sensors::SensorRegistry;
use crate::store::SeriesStore;

pub const ALL_METRICS: &str = "all";

/// Structured export for the rendering/highlighting layer: availability, the
/// most recent raw sample, and the aggregation window over the whole series,
/// per metric. Key order is stable (serde_json maps sort by key) so output
/// diffs cleanly.
pub fn render(
    store: &SeriesStore,
    registry: &SensorRegistry,
    enabled_metrics: &BTreeSet<String>,
    selector: &str,
) -> Result<Value> {
    let selected: Vec<&String> = if selector == ALL_METRICS {
        enabled_metrics.iter().collect()
    } else {
        match enabled_metrics.get(selector) {
            Some(metric) => vec![metric],
            None => return Err(Error::UnknownMetric(selector.to_string())),
        }
    };

    let mut document = serde_json::Map::new();
    for metric in selected {
        document.insert(metric.clone(), metric_entry(store, registry, metric));
    }
    Ok(Value::Object(document))
}

/// Full report for dashboards: host identity, per-metric telemetry, and the
/// power/emissions projections derived from the latest committed samples.
pub fn render_report(
    store: &SeriesStore,
    registry: &SensorRegistry,
    enabled_metrics: &BTreeSet<String>,
    host: &HostInfo,
) -> Result<Value> {
    let metrics = render(store, registry, enabled_metrics, ALL_METRICS)?;
    let derived = DerivedReport::compute(store, host);
    Ok(json!({
        "host": host,
        "metrics": metrics,
        "power": derived.power,
        "emissions": derived.emissions,
    }))
}

fn metric_entry(store: &SeriesStore, registry: &SensorRegistry, metric: &str) -> Value {
    let availability = registry.availability(metric);
    let last_sample = store
        .latest(metric)
        .map(|s| json!(s))
        .unwrap_or(Value::Null);

    // InsufficientData just means no samples yet; the entry stays with a
    // null window rather than failing the whole export.
    let series_len = store.len(metric);
    let window = if series_len > 0 {
        aggregate::aggregate(store, metric, series_len)
            .map(|w| json!(w))
            .unwrap_or(Value::Null)
    } else {
        Value::Null
    };

    json!({
        "available": availability.as_ref().map(|a| a.available).unwrap_or(false),
        "reason": availability.and_then(|a| a.reason),
        "last_sample": last_sample,
        "window": window,
    })
}
