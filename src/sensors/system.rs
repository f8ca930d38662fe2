use std::sync::{Arc, Mutex};
use sysinfo::System;

use crate::error::Result;
use crate::sensors::{
    MetricValue, Sensor, SensorAvailability, CPU_PERCENT, CPU_PER_CORE, MEMORY_PERCENT,
    SWAP_PERCENT,
};

/// One `sysinfo::System` shared by the CPU/memory/swap sensors so each tick
/// refreshes a single kernel view instead of four. sysinfo rate-limits CPU
/// refreshes internally, so back-to-back reads within a tick are cheap.
#[derive(Clone)]
pub struct SharedSystem {
    inner: Arc<Mutex<System>>,
}

impl SharedSystem {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(System::new_all())),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut System) -> T) -> T {
        let mut system = self.inner.lock().expect("system state poisoned");
        f(&mut system)
    }
}

impl Default for SharedSystem {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CpuPercentSensor {
    host: SharedSystem,
}

impl CpuPercentSensor {
    pub fn new(host: SharedSystem) -> Self {
        Self { host }
    }
}

impl Sensor for CpuPercentSensor {
    fn metric_id(&self) -> &str {
        CPU_PERCENT
    }

    fn probe(&self) -> SensorAvailability {
        // Warm-up refresh: sysinfo derives usage from the delta between two
        // refreshes, so the first sampled tick needs a baseline.
        self.host.with(|s| s.refresh_cpu_all());
        SensorAvailability::available()
    }

    fn read(&self) -> Result<MetricValue> {
        let usage = self.host.with(|s| {
            s.refresh_cpu_all();
            s.global_cpu_usage()
        });
        Ok(MetricValue::scalar(usage as f64))
    }
}

pub struct CpuPerCoreSensor {
    host: SharedSystem,
}

impl CpuPerCoreSensor {
    pub fn new(host: SharedSystem) -> Self {
        Self { host }
    }
}

impl Sensor for CpuPerCoreSensor {
    fn metric_id(&self) -> &str {
        CPU_PER_CORE
    }

    fn probe(&self) -> SensorAvailability {
        let core_count = self.host.with(|s| {
            s.refresh_cpu_all();
            s.cpus().len()
        });
        if core_count == 0 {
            SensorAvailability::unavailable("no CPU cores reported")
        } else {
            SensorAvailability::available()
        }
    }

    fn read(&self) -> Result<MetricValue> {
        let cores = self.host.with(|s| {
            s.refresh_cpu_all();
            s.cpus().iter().map(|cpu| cpu.cpu_usage()).collect::<Vec<f32>>()
        });
        Ok(MetricValue::PerCore { cores })
    }
}

pub struct MemorySensor {
    host: SharedSystem,
}

impl MemorySensor {
    pub fn new(host: SharedSystem) -> Self {
        Self { host }
    }
}

impl Sensor for MemorySensor {
    fn metric_id(&self) -> &str {
        MEMORY_PERCENT
    }

    fn probe(&self) -> SensorAvailability {
        let total = self.host.with(|s| {
            s.refresh_memory();
            s.total_memory()
        });
        if total == 0 {
            SensorAvailability::unavailable("total memory reported as zero")
        } else {
            SensorAvailability::available()
        }
    }

    fn read(&self) -> Result<MetricValue> {
        let (used, total) = self.host.with(|s| {
            s.refresh_memory();
            (s.used_memory(), s.total_memory())
        });
        let percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        };
        Ok(MetricValue::scalar(percent))
    }
}

pub struct SwapSensor {
    host: SharedSystem,
}

impl SwapSensor {
    pub fn new(host: SharedSystem) -> Self {
        Self { host }
    }
}

impl Sensor for SwapSensor {
    fn metric_id(&self) -> &str {
        SWAP_PERCENT
    }

    fn probe(&self) -> SensorAvailability {
        let total = self.host.with(|s| {
            s.refresh_memory();
            s.total_swap()
        });
        if total == 0 {
            SensorAvailability::unavailable("no swap configured on this host")
        } else {
            SensorAvailability::available()
        }
    }

    fn read(&self) -> Result<MetricValue> {
        let (used, total) = self.host.with(|s| {
            s.refresh_memory();
            (s.used_swap(), s.total_swap())
        });
        let percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        };
        Ok(MetricValue::scalar(percent))
    }
}
