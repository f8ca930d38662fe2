use serde::Serialize;
use sysinfo::System;

use crate::sensors::{CPU_PERCENT, DISK_USAGE_PERCENT, MEMORY_PERCENT};
use crate::store::SeriesStore;

/// Grid carbon intensity, gCO2 per kWh.
pub const GRID_EMISSION_FACTOR: f64 = 400.0;
/// Power usage effectiveness applied to IT power for the facility total.
pub const BASE_PUE: f64 = 1.5;

const CPU_WATTS_PER_GHZ: f64 = 15.0;
const DEFAULT_CPU_FREQ_GHZ: f64 = 2.5;
const MEM_WATTS_PER_GB: f64 = 0.5;
const DISK_ACTIVE_WATTS: f64 = 2.0;
const DISK_IDLE_WATTS: f64 = 0.5;
const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Static host identity, captured once at engine start.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub os: String,
    pub hostname: String,
    pub uptime_secs: u64,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub cpu_frequency_mhz: u64,
    pub memory_total_gb: f64,
}

impl HostInfo {
    pub fn collect() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();

        let os = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{name} {version}"),
            (Some(name), None) => name,
            _ => "unknown".to_string(),
        };

        Self {
            os,
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            uptime_secs: System::uptime(),
            physical_cores: system.physical_core_count().unwrap_or(0),
            logical_cores: system.cpus().len(),
            cpu_frequency_mhz: system.cpus().first().map(|c| c.frequency()).unwrap_or(0),
            memory_total_gb: system.total_memory() as f64 / BYTES_PER_GB,
        }
    }

    fn cpu_frequency_ghz(&self) -> Option<f64> {
        if self.cpu_frequency_mhz == 0 {
            None
        } else {
            Some(self.cpu_frequency_mhz as f64 / 1000.0)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerComponents {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

/// Estimated draw in watts: per-component IT power plus the facility total
/// after PUE.
#[derive(Debug, Clone, Serialize)]
pub struct PowerEstimate {
    pub components: PowerComponents,
    pub total_it: f64,
    pub total_facility: f64,
    pub pue: f64,
}

impl PowerEstimate {
    /// CPU scales with load and clock, memory with resident gigabytes and
    /// pressure, disk is a two-level constant keyed on whether the host has
    /// any disk telemetry at all.
    pub fn estimate(
        cpu_usage_percent: f64,
        cpu_freq_ghz: Option<f64>,
        memory_used_gb: f64,
        memory_percent: f64,
        disk_active: bool,
    ) -> Self {
        let freq_ghz = cpu_freq_ghz.unwrap_or(DEFAULT_CPU_FREQ_GHZ);
        let cpu = (cpu_usage_percent / 100.0) * freq_ghz * CPU_WATTS_PER_GHZ;
        let memory = (memory_used_gb * MEM_WATTS_PER_GB) * (memory_percent / 100.0 + 0.1);
        let disk = if disk_active { DISK_ACTIVE_WATTS } else { DISK_IDLE_WATTS };

        let total_it = cpu + memory + disk;
        let total_facility = total_it * BASE_PUE;

        Self {
            components: PowerComponents {
                cpu: round_to(cpu, 1),
                memory: round_to(memory, 1),
                disk: round_to(disk, 1),
            },
            total_it: round_to(total_it, 1),
            total_facility: round_to(total_facility, 1),
            pue: BASE_PUE,
        }
    }
}

/// CO2 projection for a sustained power draw.
#[derive(Debug, Clone, Serialize)]
pub struct EmissionsEstimate {
    pub hourly_g: f64,
    pub daily_kg: f64,
    pub annual_tonnes: f64,
}

impl EmissionsEstimate {
    pub fn from_power(watts: f64) -> Self {
        let hourly_g = (watts / 1000.0) * GRID_EMISSION_FACTOR;
        Self {
            hourly_g: round_to(hourly_g, 1),
            daily_kg: round_to(hourly_g * 24.0 / 1000.0, 2),
            annual_tonnes: round_to(hourly_g * 24.0 * 365.0 / 1_000_000.0, 3),
        }
    }
}

/// Power and emissions derived from the latest committed samples. Pure over
/// engine state; no sensor is touched here.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedReport {
    pub power: PowerEstimate,
    pub emissions: EmissionsEstimate,
}

impl DerivedReport {
    pub fn compute(store: &SeriesStore, host: &HostInfo) -> Self {
        let latest_scalar = |metric: &str| {
            store.latest(metric).and_then(|s| s.value.as_scalar())
        };
        let cpu_usage = latest_scalar(CPU_PERCENT).unwrap_or(0.0);
        let memory_percent = latest_scalar(MEMORY_PERCENT).unwrap_or(0.0);
        let memory_used_gb = host.memory_total_gb * memory_percent / 100.0;
        let disk_active = store.len(DISK_USAGE_PERCENT) > 0;

        let power = PowerEstimate::estimate(
            cpu_usage,
            host.cpu_frequency_ghz(),
            memory_used_gb,
            memory_percent,
            disk_active,
        );
        let emissions = EmissionsEstimate::from_power(power.total_facility);
        Self { power, emissions }
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
