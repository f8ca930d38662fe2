use std::sync::Mutex;
use sysinfo::Networks;

use crate::error::Result;
use crate::sensors::{MetricValue, Sensor, SensorAvailability, NET_RECV_BYTES, NET_SENT_BYTES};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Received,
    Transmitted,
}

struct NetState {
    networks: Networks,
    last_total: Option<u64>,
}

/// Bytes moved across all interfaces since the previous tick, computed as a
/// delta of the kernel's cumulative counters. The baseline is primed at probe
/// time so the first sampled tick is already a real delta.
pub struct NetThroughputSensor {
    direction: Direction,
    state: Mutex<NetState>,
}

impl NetThroughputSensor {
    pub fn received() -> Self {
        Self::new(Direction::Received)
    }

    pub fn transmitted() -> Self {
        Self::new(Direction::Transmitted)
    }

    fn new(direction: Direction) -> Self {
        Self {
            direction,
            state: Mutex::new(NetState {
                networks: Networks::new_with_refreshed_list(),
                last_total: None,
            }),
        }
    }

    fn current_total(&self, state: &NetState) -> u64 {
        state
            .networks
            .iter()
            .map(|(_, data)| match self.direction {
                Direction::Received => data.total_received(),
                Direction::Transmitted => data.total_transmitted(),
            })
            .fold(0u64, u64::saturating_add)
    }
}

impl Sensor for NetThroughputSensor {
    fn metric_id(&self) -> &str {
        match self.direction {
            Direction::Received => NET_RECV_BYTES,
            Direction::Transmitted => NET_SENT_BYTES,
        }
    }

    fn probe(&self) -> SensorAvailability {
        let mut state = self.state.lock().expect("network state poisoned");
        state.networks.refresh_list();
        if state.networks.iter().next().is_none() {
            return SensorAvailability::unavailable("no network interfaces reported");
        }
        let total = self.current_total(&state);
        state.last_total = Some(total);
        SensorAvailability::available()
    }

    fn read(&self) -> Result<MetricValue> {
        let mut state = self.state.lock().expect("network state poisoned");
        state.networks.refresh();
        let total = self.current_total(&state);
        // Counters can step backwards when an interface disappears; clamp
        // rather than emit a huge bogus delta.
        let delta = state
            .last_total
            .map(|last| total.saturating_sub(last))
            .unwrap_or(0);
        state.last_total = Some(total);
        Ok(MetricValue::scalar(delta as f64))
    }
}
