pub mod disk;
pub mod network;
pub mod system;

#[cfg(feature = "nvidia")]
pub mod gpu;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::config::Config;
use crate::error::Result;

pub const CPU_PERCENT: &str = "cpu_percent";
pub const CPU_PER_CORE: &str = "cpu_per_core";
pub const MEMORY_PERCENT: &str = "memory_percent";
pub const SWAP_PERCENT: &str = "swap_percent";
pub const DISK_USAGE_PERCENT: &str = "disk_usage_percent";
pub const NET_RECV_BYTES: &str = "net_recv_bytes";
pub const NET_SENT_BYTES: &str = "net_sent_bytes";
pub const GPU: &str = "gpu";

pub fn known_metric_ids() -> &'static [&'static str] {
    &[
        CPU_PERCENT,
        CPU_PER_CORE,
        MEMORY_PERCENT,
        SWAP_PERCENT,
        DISK_USAGE_PERCENT,
        NET_RECV_BYTES,
        NET_SENT_BYTES,
        GPU,
    ]
}

/// One observed value. The shape varies per metric, so downstream code
/// dispatches on the variant instead of sniffing a bare float.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricValue {
    Scalar { value: f64 },
    PerCore { cores: Vec<f32> },
    Gpu { reading: GpuReading },
}

impl MetricValue {
    pub fn scalar(value: f64) -> Self {
        MetricValue::Scalar { value }
    }

    /// Scalar view used for aggregation: per-core lists collapse to their
    /// mean, GPU readings aggregate on utilization. `None` means this sample
    /// carries nothing aggregatable.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar { value } => Some(*value),
            MetricValue::PerCore { cores } => {
                if cores.is_empty() {
                    None
                } else {
                    Some(cores.iter().map(|c| *c as f64).sum::<f64>() / cores.len() as f64)
                }
            }
            MetricValue::Gpu { reading } => reading.utilization.map(|u| u as f64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GpuReading {
    pub name: String,
    pub utilization: Option<f32>,
    pub memory_used: Option<u64>,
    pub memory_total: Option<u64>,
    pub temperature: Option<f32>,
    pub power_draw: Option<f32>,
}

impl GpuReading {
    pub fn memory_usage_percent(&self) -> Option<f32> {
        match (self.memory_used, self.memory_total) {
            (Some(used), Some(total)) if total > 0 => {
                Some((used as f32 / total as f32) * 100.0)
            }
            _ => None,
        }
    }
}

/// One timestamped observation of a metric. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    pub metric_id: String,
    pub timestamp_ms: u64,
    pub value: MetricValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorAvailability {
    pub available: bool,
    pub reason: Option<String>,
}

impl SensorAvailability {
    pub fn available() -> Self {
        Self { available: true, reason: None }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { available: false, reason: Some(reason.into()) }
    }
}

/// Uniform polling interface over heterogeneous host sensors. Reads take
/// `&self` (interior mutability) so the sampler can enforce a deadline from
/// another thread without handing over ownership.
pub trait Sensor: Send + Sync {
    fn metric_id(&self) -> &str;
    fn probe(&self) -> SensorAvailability;
    fn read(&self) -> Result<MetricValue>;
}

/// Probed sensor set plus the per-metric availability table. Availability is
/// written at probe time and by explicit re-probes only; the sampler consults
/// it before every read.
pub struct SensorRegistry {
    sensors: BTreeMap<String, Arc<dyn Sensor>>,
    availability: RwLock<BTreeMap<String, SensorAvailability>>,
}

impl SensorRegistry {
    /// Every enabled metric gets an availability entry, even when no sensor
    /// was registered for it, so exports can report why a metric is dark.
    pub fn new(sensors: Vec<Arc<dyn Sensor>>, enabled_metrics: &std::collections::BTreeSet<String>) -> Self {
        let mut table = BTreeMap::new();
        for metric in enabled_metrics {
            table.insert(
                metric.clone(),
                SensorAvailability::unavailable("no sensor registered for this metric"),
            );
        }
        let sensors = sensors
            .into_iter()
            .map(|s| (s.metric_id().to_string(), s))
            .collect();
        Self {
            sensors,
            availability: RwLock::new(table),
        }
    }

    /// Startup probe over every registered sensor.
    pub fn probe_all(&self) {
        for (metric, sensor) in &self.sensors {
            let availability = sensor.probe();
            if availability.available {
                log::info!("Sensor probe ok: {}", metric);
            } else {
                log::warn!(
                    "Sensor unavailable: {} ({})",
                    metric,
                    availability.reason.as_deref().unwrap_or("unknown reason")
                );
            }
            self.availability
                .write()
                .expect("availability table poisoned")
                .insert(metric.clone(), availability);
        }
    }

    pub fn sensor(&self, metric_id: &str) -> Option<Arc<dyn Sensor>> {
        self.sensors.get(metric_id).cloned()
    }

    pub fn is_available(&self, metric_id: &str) -> bool {
        self.availability
            .read()
            .expect("availability table poisoned")
            .get(metric_id)
            .map(|a| a.available)
            .unwrap_or(false)
    }

    pub fn availability(&self, metric_id: &str) -> Option<SensorAvailability> {
        self.availability
            .read()
            .expect("availability table poisoned")
            .get(metric_id)
            .cloned()
    }

    pub fn mark_unavailable(&self, metric_id: &str, reason: impl Into<String>) {
        self.availability
            .write()
            .expect("availability table poisoned")
            .insert(metric_id.to_string(), SensorAvailability::unavailable(reason));
    }

    /// Re-probe one sensor, e.g. after sustained read failures. Returns the
    /// new availability.
    pub fn reprobe(&self, metric_id: &str) -> bool {
        let Some(sensor) = self.sensors.get(metric_id) else {
            return false;
        };
        let availability = sensor.probe();
        let available = availability.available;
        log::info!(
            "Re-probed sensor {}: {}",
            metric_id,
            if available { "available" } else { "unavailable" }
        );
        self.availability
            .write()
            .expect("availability table poisoned")
            .insert(metric_id.to_string(), availability);
        available
    }
}

/// Build the host sensor set for the enabled metrics. GPU detection is
/// skipped entirely when `gpu_probe_enabled` is off so NVML is never loaded.
pub fn detect_sensors(config: &Config) -> Vec<Arc<dyn Sensor>> {
    let mut sensors: Vec<Arc<dyn Sensor>> = Vec::new();
    let enabled = |id: &str| config.enabled_metrics.contains(id);

    let host = system::SharedSystem::new();
    if enabled(CPU_PERCENT) {
        sensors.push(Arc::new(system::CpuPercentSensor::new(host.clone())));
    }
    if enabled(CPU_PER_CORE) {
        sensors.push(Arc::new(system::CpuPerCoreSensor::new(host.clone())));
    }
    if enabled(MEMORY_PERCENT) {
        sensors.push(Arc::new(system::MemorySensor::new(host.clone())));
    }
    if enabled(SWAP_PERCENT) {
        sensors.push(Arc::new(system::SwapSensor::new(host)));
    }
    if enabled(DISK_USAGE_PERCENT) {
        sensors.push(Arc::new(disk::DiskUsageSensor::new()));
    }
    if enabled(NET_RECV_BYTES) {
        sensors.push(Arc::new(network::NetThroughputSensor::received()));
    }
    if enabled(NET_SENT_BYTES) {
        sensors.push(Arc::new(network::NetThroughputSensor::transmitted()));
    }

    #[cfg(feature = "nvidia")]
    if enabled(GPU) && config.gpu_probe_enabled {
        sensors.push(Arc::new(gpu::NvmlSensor::new()));
    }

    sensors
}
