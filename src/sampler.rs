use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sensors::{MetricSample, MetricValue, Sensor, SensorRegistry};
use crate::store::SeriesStore;

/// Consecutive read failures on one metric before its sensor is re-probed
/// (covers hot-plugged GPUs and drivers that went away).
const REPROBE_AFTER_FAILURES: u32 = 5;

/// Background polling loop. Sole writer into the store; transient sensor
/// errors are logged and skipped so a single bad sensor never stops the
/// loop or corrupts another metric's series.
pub struct Sampler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Sampler {
    pub fn spawn(
        registry: Arc<SensorRegistry>,
        store: Arc<SeriesStore>,
        config: &Config,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let mut tick_loop = TickLoop {
            registry,
            store,
            enabled: config.enabled_metrics.iter().cloned().collect(),
            interval: config.sample_interval(),
            read_timeout: config.read_timeout(),
            failures: HashMap::new(),
        };
        let loop_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("sysvitals-sampler".to_string())
            .spawn(move || {
                tick_loop.run(stop_rx);
                loop_running.store(false, Ordering::SeqCst);
            })?;
        Ok(Self {
            stop_tx,
            handle: Some(handle),
            running,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signals the loop and joins it. The in-flight tick finishes its writes
    /// first, so no partially-written tick is observable once this returns.
    /// Stopped is terminal; idempotent.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TickLoop {
    registry: Arc<SensorRegistry>,
    store: Arc<SeriesStore>,
    enabled: Vec<String>,
    interval: Duration,
    read_timeout: Duration,
    failures: HashMap<String, u32>,
}

impl TickLoop {
    fn run(&mut self, stop_rx: Receiver<()>) {
        log::info!(
            "Starting sampling loop (interval: {}ms, {} metrics)",
            self.interval.as_millis(),
            self.enabled.len()
        );
        loop {
            let tick_start = Instant::now();
            self.tick();

            // The stop channel doubles as the tick wait, so cancellation
            // lands within one interval instead of after a full sleep.
            let elapsed = tick_start.elapsed();
            let wait = self.interval.saturating_sub(elapsed);
            match stop_rx.recv_timeout(wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::info!("Sampling loop stop signal received");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    fn tick(&mut self) {
        let enabled = self.enabled.clone();
        for metric in &enabled {
            if !self.registry.is_available(metric) {
                continue;
            }
            let Some(sensor) = self.registry.sensor(metric) else {
                continue;
            };
            match read_with_timeout(sensor, metric, self.read_timeout) {
                Ok(value) => {
                    self.failures.remove(metric);
                    self.store.append(MetricSample {
                        metric_id: metric.clone(),
                        timestamp_ms: now_ms(),
                        value,
                    });
                }
                Err(Error::SensorUnavailable { reason, .. }) => {
                    log::warn!("Sensor for {} became unavailable: {}", metric, reason);
                    self.registry.mark_unavailable(metric, reason);
                }
                Err(e) => {
                    log::warn!("Skipping {} for this tick: {}", metric, e);
                    let count = self.failures.entry(metric.clone()).or_insert(0);
                    *count += 1;
                    if *count >= REPROBE_AFTER_FAILURES {
                        self.failures.remove(metric);
                        if !self.registry.reprobe(metric) {
                            log::warn!(
                                "Sensor for {} failed {} consecutive reads and re-probe; marking unavailable",
                                metric,
                                REPROBE_AFTER_FAILURES
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Runs the read on a detached thread and bounds the wait. A sensor that
/// hangs past the deadline leaks its reader thread until the read returns,
/// but the sampling loop moves on.
fn read_with_timeout(
    sensor: Arc<dyn Sensor>,
    metric: &str,
    timeout: Duration,
) -> Result<MetricValue> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(&sensor);
    thread::spawn(move || {
        let _ = tx.send(worker.read());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(Error::SensorRead {
            metric: metric.to_string(),
            reason: format!("read exceeded {}ms deadline", timeout.as_millis()),
        }),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorAvailability;

    struct SlowSensor {
        delay: Duration,
    }

    impl Sensor for SlowSensor {
        fn metric_id(&self) -> &str {
            "cpu_percent"
        }

        fn probe(&self) -> SensorAvailability {
            SensorAvailability::available()
        }

        fn read(&self) -> crate::Result<MetricValue> {
            thread::sleep(self.delay);
            Ok(MetricValue::scalar(1.0))
        }
    }

    #[test]
    fn test_read_within_deadline_succeeds() {
        let sensor: Arc<dyn Sensor> = Arc::new(SlowSensor {
            delay: Duration::from_millis(0),
        });
        let value = read_with_timeout(sensor, "cpu_percent", Duration::from_millis(500)).unwrap();
        assert!(matches!(value, MetricValue::Scalar { .. }));
    }

    #[test]
    fn test_read_past_deadline_is_read_error() {
        let sensor: Arc<dyn Sensor> = Arc::new(SlowSensor {
            delay: Duration::from_millis(300),
        });
        let result = read_with_timeout(sensor, "cpu_percent", Duration::from_millis(20));
        assert!(matches!(result, Err(Error::SensorRead { .. })));
    }
}
