use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sensors;

/// Engine configuration. Environment overrides are applied once, at startup,
/// via [`Config::from_env`]; after `start` the engine never re-reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
    #[serde(default = "default_enabled_metrics")]
    pub enabled_metrics: BTreeSet<String>,
    #[serde(default = "default_gpu_probe_enabled")]
    pub gpu_probe_enabled: bool,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_interval_ms() -> u64 { 1000 }
fn default_series_capacity() -> usize { 60 }
fn default_gpu_probe_enabled() -> bool { true }
fn default_read_timeout_ms() -> u64 { 500 }

fn default_enabled_metrics() -> BTreeSet<String> {
    sensors::known_metric_ids().iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_interval_ms(),
            series_capacity: default_series_capacity(),
            enabled_metrics: default_enabled_metrics(),
            gpu_probe_enabled: default_gpu_probe_enabled(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Config {
    /// Defaults plus `SYSVITALS_*` environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = env::var("SYSVITALS_SAMPLE_INTERVAL_SECONDS") {
            let secs: f64 = raw.parse().map_err(|_| {
                Error::Config(format!("invalid SYSVITALS_SAMPLE_INTERVAL_SECONDS: {raw}"))
            })?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(Error::Config(format!(
                    "SYSVITALS_SAMPLE_INTERVAL_SECONDS must be positive, got {raw}"
                )));
            }
            self.sample_interval_ms = (secs * 1000.0) as u64;
        }

        if let Ok(raw) = env::var("SYSVITALS_SERIES_CAPACITY") {
            self.series_capacity = raw.parse().map_err(|_| {
                Error::Config(format!("invalid SYSVITALS_SERIES_CAPACITY: {raw}"))
            })?;
        }

        if let Ok(raw) = env::var("SYSVITALS_ENABLED_METRICS") {
            self.enabled_metrics = raw
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }

        if let Ok(raw) = env::var("SYSVITALS_GPU_PROBE") {
            self.gpu_probe_enabled = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(Error::Config(format!("invalid SYSVITALS_GPU_PROBE: {raw}")))
                }
            };
        }

        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Rejects configurations the engine cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(Error::Config("sample interval must be positive".to_string()));
        }
        if self.series_capacity == 0 {
            return Err(Error::Config("series capacity must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::Config("read timeout must be positive".to_string()));
        }
        if self.enabled_metrics.is_empty() {
            return Err(Error::Config("no metrics enabled".to_string()));
        }
        for metric in &self.enabled_metrics {
            if !sensors::known_metric_ids().contains(&metric.as_str()) {
                return Err(Error::Config(format!("unknown metric in config: {metric}")));
            }
        }
        Ok(())
    }
}
