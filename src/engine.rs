use serde_json::Value;
use std::sync::Arc;

use crate::aggregate::{self, AggregationWindow};
use crate::config::Config;
use crate::derived::{DerivedReport, HostInfo};
use crate::error::{Error, Result};
use crate::export;
use crate::sampler::Sampler;
use crate::sensors::{self, MetricSample, Sensor, SensorRegistry};
use crate::store::SeriesStore;

/// The owned telemetry engine: probed sensor registry, bounded series store,
/// and one background sampler. Readers call `query`/`snapshot`/`export_json`
/// concurrently with sampling; none of them block on a tick.
pub struct Engine {
    config: Config,
    store: Arc<SeriesStore>,
    registry: Arc<SensorRegistry>,
    sampler: Option<Sampler>,
    host: HostInfo,
}

impl Engine {
    /// Validates config, probes the host sensors, and starts sampling.
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;
        let sensors = sensors::detect_sensors(&config);
        Self::with_sensors(config, sensors)
    }

    /// Same lifecycle with an injected sensor set. This is the seam tests
    /// use to drive the engine with fakes.
    pub fn with_sensors(config: Config, sensors: Vec<Arc<dyn Sensor>>) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Starting telemetry engine ({} sensors, capacity {})",
            sensors.len(),
            config.series_capacity
        );
        let registry = Arc::new(SensorRegistry::new(sensors, &config.enabled_metrics));
        registry.probe_all();
        let store = Arc::new(SeriesStore::new(config.series_capacity));
        let sampler = Sampler::spawn(Arc::clone(&registry), Arc::clone(&store), &config)?;
        Ok(Self {
            config,
            store,
            registry,
            sampler: Some(sampler),
            host: HostInfo::collect(),
        })
    }

    /// Stops the sampler after its in-flight tick and joins it. Idempotent;
    /// also runs on drop.
    pub fn stop(&mut self) {
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
            log::info!("Telemetry engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.sampler.as_ref().map(|s| s.is_running()).unwrap_or(false)
    }

    /// Windowed summary over the last `window` samples of one metric.
    pub fn query(&self, metric_id: &str, window: usize) -> Result<AggregationWindow> {
        if !self.config.enabled_metrics.contains(metric_id) {
            return Err(Error::UnknownMetric(metric_id.to_string()));
        }
        aggregate::aggregate(&self.store, metric_id, window)
    }

    /// Last `count` raw samples, oldest first. Empty for metrics with no
    /// history yet.
    pub fn snapshot(&self, metric_id: &str, count: usize) -> Vec<MetricSample> {
        self.store.snapshot(metric_id, count)
    }

    /// JSON document for one metric id or [`export::ALL_METRICS`].
    pub fn export_json(&self, selector: &str) -> Result<Value> {
        export::render(
            &self.store,
            &self.registry,
            &self.config.enabled_metrics,
            selector,
        )
    }

    /// Full report: host identity plus per-metric telemetry plus the derived
    /// power/emissions projections.
    pub fn export_report(&self) -> Result<Value> {
        export::render_report(
            &self.store,
            &self.registry,
            &self.config.enabled_metrics,
            &self.host,
        )
    }

    /// Power and emissions derived from the latest committed samples.
    pub fn derived(&self) -> DerivedReport {
        DerivedReport::compute(&self.store, &self.host)
    }

    pub fn host_info(&self) -> &HostInfo {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
