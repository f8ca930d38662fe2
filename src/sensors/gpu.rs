use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::sensors::{GpuReading, MetricValue, Sensor, SensorAvailability, GPU};

/// NVML-backed reading of the primary GPU (device 0). NVML is initialized
/// lazily at probe time so hosts without the driver never touch the library
/// past one failed init.
pub struct NvmlSensor {
    nvml: Mutex<Option<Nvml>>,
}

impl NvmlSensor {
    pub fn new() -> Self {
        Self {
            nvml: Mutex::new(None),
        }
    }
}

impl Default for NvmlSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for NvmlSensor {
    fn metric_id(&self) -> &str {
        GPU
    }

    fn probe(&self) -> SensorAvailability {
        let mut guard = self.nvml.lock().expect("NVML handle poisoned");
        if guard.is_none() {
            match Nvml::init() {
                Ok(nvml) => *guard = Some(nvml),
                Err(e) => {
                    return SensorAvailability::unavailable(format!(
                        "Failed to initialize NVML: {e}"
                    ));
                }
            }
        }
        let nvml = guard.as_ref().expect("NVML initialized above");
        match nvml.device_count() {
            Ok(0) => SensorAvailability::unavailable("No NVIDIA GPUs detected"),
            Ok(_) => SensorAvailability::available(),
            Err(e) => SensorAvailability::unavailable(format!("Failed to get device count: {e}")),
        }
    }

    fn read(&self) -> Result<MetricValue> {
        let guard = self.nvml.lock().expect("NVML handle poisoned");
        let nvml = guard.as_ref().ok_or_else(|| Error::SensorUnavailable {
            metric: GPU.to_string(),
            reason: "NVML not initialized; probe first".to_string(),
        })?;

        let device = nvml.device_by_index(0).map_err(|e| Error::SensorRead {
            metric: GPU.to_string(),
            reason: format!("Failed to open device 0: {e}"),
        })?;

        // Individual field failures degrade to None; only losing the device
        // entirely is a read error.
        let reading = GpuReading {
            name: device.name().unwrap_or_else(|_| "unknown".to_string()),
            utilization: device.utilization_rates().ok().map(|u| u.gpu as f32),
            memory_used: device.memory_info().ok().map(|m| m.used),
            memory_total: device.memory_info().ok().map(|m| m.total),
            temperature: device
                .temperature(TemperatureSensor::Gpu)
                .ok()
                .map(|t| t as f32),
            power_draw: device.power_usage().ok().map(|p| p as f32 / 1000.0),
        };
        Ok(MetricValue::Gpu { reading })
    }
}
