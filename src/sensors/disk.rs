use std::sync::Mutex;
use sysinfo::Disks;

use crate::error::Result;
use crate::sensors::{MetricValue, Sensor, SensorAvailability, DISK_USAGE_PERCENT};

/// Usage percent summed across all mounted disks (total used / total space).
pub struct DiskUsageSensor {
    disks: Mutex<Disks>,
}

impl DiskUsageSensor {
    pub fn new() -> Self {
        Self {
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }
}

impl Default for DiskUsageSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for DiskUsageSensor {
    fn metric_id(&self) -> &str {
        DISK_USAGE_PERCENT
    }

    fn probe(&self) -> SensorAvailability {
        let mut disks = self.disks.lock().expect("disk state poisoned");
        disks.refresh_list();
        if disks.list().is_empty() {
            SensorAvailability::unavailable("no disks reported")
        } else {
            SensorAvailability::available()
        }
    }

    fn read(&self) -> Result<MetricValue> {
        let mut disks = self.disks.lock().expect("disk state poisoned");
        disks.refresh();

        let mut total_space: u64 = 0;
        let mut used_space: u64 = 0;
        for disk in disks.list() {
            total_space = total_space.saturating_add(disk.total_space());
            used_space = used_space
                .saturating_add(disk.total_space().saturating_sub(disk.available_space()));
        }

        let percent = if total_space == 0 {
            0.0
        } else {
            (used_space as f64 / total_space as f64) * 100.0
        };
        Ok(MetricValue::scalar(percent))
    }
}
