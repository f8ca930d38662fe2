use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sysvitals::{
    Config, Engine, Error, MetricValue, Result, Sensor, SensorAvailability,
};

struct CountingSensor {
    metric: &'static str,
    reads: AtomicU32,
}

impl CountingSensor {
    fn new(metric: &'static str) -> Self {
        Self {
            metric,
            reads: AtomicU32::new(0),
        }
    }
}

impl Sensor for CountingSensor {
    fn metric_id(&self) -> &str {
        self.metric
    }

    fn probe(&self) -> SensorAvailability {
        SensorAvailability::available()
    }

    fn read(&self) -> Result<MetricValue> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MetricValue::scalar(n as f64))
    }
}

/// Fails every second read with a transient error.
struct FlakySensor {
    metric: &'static str,
    reads: AtomicU32,
}

impl Sensor for FlakySensor {
    fn metric_id(&self) -> &str {
        self.metric
    }

    fn probe(&self) -> SensorAvailability {
        SensorAvailability::available()
    }

    fn read(&self) -> Result<MetricValue> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 1 {
            Err(Error::SensorRead {
                metric: self.metric.to_string(),
                reason: "transient sensor glitch".to_string(),
            })
        } else {
            Ok(MetricValue::scalar(n as f64))
        }
    }
}

struct MissingSensor {
    metric: &'static str,
}

impl Sensor for MissingSensor {
    fn metric_id(&self) -> &str {
        self.metric
    }

    fn probe(&self) -> SensorAvailability {
        SensorAvailability::unavailable("hardware not present")
    }

    fn read(&self) -> Result<MetricValue> {
        Err(Error::SensorUnavailable {
            metric: self.metric.to_string(),
            reason: "hardware not present".to_string(),
        })
    }
}

fn config(metrics: &[&str], interval_ms: u64, capacity: usize) -> Config {
    Config {
        sample_interval_ms: interval_ms,
        series_capacity: capacity,
        enabled_metrics: metrics.iter().map(|m| m.to_string()).collect::<BTreeSet<_>>(),
        gpu_probe_enabled: true,
        read_timeout_ms: 100,
    }
}

#[test]
fn capacity_bound_and_monotonic_timestamps() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(CountingSensor::new("cpu_percent"))];
    let mut engine =
        Engine::with_sensors(config(&["cpu_percent"], 10, 5), sensors).unwrap();

    thread::sleep(Duration::from_millis(300));
    engine.stop();

    let snap = engine.snapshot("cpu_percent", 100);
    assert_eq!(snap.len(), 5, "series must be capped at capacity");
    for pair in snap.windows(2) {
        assert!(pair[0].timestamp_ms <= pair[1].timestamp_ms);
    }
    // Eviction kept the most recent readings: counting values must be
    // consecutive and increasing.
    let values: Vec<f64> = snap.iter().filter_map(|s| s.value.as_scalar()).collect();
    for pair in values.windows(2) {
        assert_eq!(pair[1] - pair[0], 1.0);
    }
}

#[test]
fn unavailable_sensor_never_contributes_samples() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![
        Arc::new(CountingSensor::new("cpu_percent")),
        Arc::new(MissingSensor { metric: "gpu" }),
    ];
    let mut engine =
        Engine::with_sensors(config(&["cpu_percent", "gpu"], 10, 10), sensors).unwrap();

    thread::sleep(Duration::from_millis(120));
    engine.stop();

    assert!(engine.snapshot("gpu", 100).is_empty());
    assert!(!engine.snapshot("cpu_percent", 100).is_empty());

    let doc = engine.export_json("all").unwrap();
    assert_eq!(doc["gpu"]["available"], serde_json::Value::Bool(false));
    assert_eq!(doc["gpu"]["reason"], "hardware not present");
}

#[test]
fn transient_failures_do_not_corrupt_or_stop_sampling() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(FlakySensor {
        metric: "memory_percent",
        reads: AtomicU32::new(0),
    })];
    let mut engine =
        Engine::with_sensors(config(&["memory_percent"], 10, 50), sensors).unwrap();

    thread::sleep(Duration::from_millis(300));
    engine.stop();

    let snap = engine.snapshot("memory_percent", 100);
    // Half the reads fail, so the loop must have survived several failures
    // and kept producing on the ticks in between.
    assert!(snap.len() >= 3, "expected successes past the failed ticks");
    for pair in snap.windows(2) {
        assert!(pair[0].timestamp_ms <= pair[1].timestamp_ms);
    }
    // Only even read indices succeed; no failed tick left a partial sample.
    for sample in &snap {
        let v = sample.value.as_scalar().unwrap();
        assert_eq!(v as u64 % 2, 0);
    }
}

#[test]
fn export_all_keys_match_enabled_metrics() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![
        Arc::new(CountingSensor::new("cpu_percent")),
        Arc::new(CountingSensor::new("memory_percent")),
    ];
    let mut engine = Engine::with_sensors(
        config(&["cpu_percent", "memory_percent"], 10, 10),
        sensors,
    )
    .unwrap();

    thread::sleep(Duration::from_millis(120));
    engine.stop();

    let doc = engine.export_json("all").unwrap();
    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["cpu_percent", "memory_percent"]);
    for key in keys {
        let window = &doc[key]["window"];
        assert!(window["min"].is_number());
        assert!(window["max"].is_number());
        assert!(window["mean"].is_number());
        assert!(window["p50"].is_number());
        assert!(window["p95"].is_number());
    }
}

#[test]
fn stop_lands_within_a_tick_and_leaves_consistent_state() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(CountingSensor::new("cpu_percent"))];
    let mut engine =
        Engine::with_sensors(config(&["cpu_percent"], 200, 50), sensors).unwrap();

    thread::sleep(Duration::from_millis(50));
    let before_stop = Instant::now();
    engine.stop();
    assert!(
        before_stop.elapsed() < Duration::from_secs(1),
        "stop must take effect within roughly one tick interval"
    );
    assert!(!engine.is_running());

    // Nothing writes after stop returns: successive snapshots agree and no
    // sample is duplicated or half-written.
    let first = engine.snapshot("cpu_percent", 100);
    thread::sleep(Duration::from_millis(250));
    let second = engine.snapshot("cpu_percent", 100);
    assert_eq!(first.len(), second.len());
    let a: Vec<u64> = first.iter().map(|s| s.timestamp_ms).collect();
    let b: Vec<u64> = second.iter().map(|s| s.timestamp_ms).collect();
    assert_eq!(a, b);
    let values: Vec<f64> = first.iter().filter_map(|s| s.value.as_scalar()).collect();
    let mut deduped = values.clone();
    deduped.dedup();
    assert_eq!(values, deduped, "no duplicate samples after stop");
}

#[test]
fn query_errors_are_structural() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(CountingSensor::new("cpu_percent"))];
    let mut engine =
        Engine::with_sensors(config(&["cpu_percent"], 10, 10), sensors).unwrap();

    assert!(matches!(
        engine.query("made_up_metric", 10),
        Err(Error::UnknownMetric(_))
    ));
    assert!(matches!(
        engine.export_json("made_up_metric"),
        Err(Error::UnknownMetric(_))
    ));

    thread::sleep(Duration::from_millis(100));
    engine.stop();

    let window = engine.query("cpu_percent", 10).unwrap();
    assert!(window.min >= 1.0);
    assert!(window.max >= window.min);
}

/// Fails its first five reads, then recovers.
struct RecoveringSensor {
    reads: AtomicU32,
}

impl Sensor for RecoveringSensor {
    fn metric_id(&self) -> &str {
        "cpu_percent"
    }

    fn probe(&self) -> SensorAvailability {
        SensorAvailability::available()
    }

    fn read(&self) -> Result<MetricValue> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if n < 5 {
            Err(Error::SensorRead {
                metric: "cpu_percent".to_string(),
                reason: "driver hiccup".to_string(),
            })
        } else {
            Ok(MetricValue::scalar(n as f64))
        }
    }
}

/// Answers the startup probe, then goes away for good: every read fails and
/// every later probe reports the hardware missing.
struct DyingSensor {
    probes: Arc<AtomicU32>,
    reads: Arc<AtomicU32>,
}

impl Sensor for DyingSensor {
    fn metric_id(&self) -> &str {
        "gpu"
    }

    fn probe(&self) -> SensorAvailability {
        if self.probes.fetch_add(1, Ordering::SeqCst) == 0 {
            SensorAvailability::available()
        } else {
            SensorAvailability::unavailable("driver unloaded")
        }
    }

    fn read(&self) -> Result<MetricValue> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(Error::SensorRead {
            metric: "gpu".to_string(),
            reason: "device lost".to_string(),
        })
    }
}

#[test]
fn sustained_failures_trigger_reprobe_and_sampling_resumes() {
    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(RecoveringSensor {
        reads: AtomicU32::new(0),
    })];
    let mut engine =
        Engine::with_sensors(config(&["cpu_percent"], 10, 50), sensors).unwrap();

    thread::sleep(Duration::from_millis(400));
    engine.stop();

    // Five straight failures hit the re-probe threshold; the probe still
    // answers, so the metric stays live and the recovered reads land.
    let snap = engine.snapshot("cpu_percent", 100);
    assert!(
        !snap.is_empty(),
        "sampling must resume once the sensor recovers"
    );
    for sample in &snap {
        assert!(sample.value.as_scalar().unwrap() >= 5.0);
    }
    let doc = engine.export_json("all").unwrap();
    assert_eq!(doc["cpu_percent"]["available"], serde_json::Value::Bool(true));
}

#[test]
fn failed_reprobe_marks_metric_unavailable_and_stops_reads() {
    let reads = Arc::new(AtomicU32::new(0));
    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(DyingSensor {
        probes: Arc::new(AtomicU32::new(0)),
        reads: Arc::clone(&reads),
    })];
    let mut engine = Engine::with_sensors(config(&["gpu"], 10, 50), sensors).unwrap();

    thread::sleep(Duration::from_millis(400));
    engine.stop();

    // Exactly the five reads leading up to the failed re-probe; after the
    // metric goes dark the sampler must not touch the sensor again.
    assert_eq!(reads.load(Ordering::SeqCst), 5);
    assert!(engine.snapshot("gpu", 100).is_empty());

    let doc = engine.export_json("all").unwrap();
    assert_eq!(doc["gpu"]["available"], serde_json::Value::Bool(false));
    assert_eq!(doc["gpu"]["reason"], "driver unloaded");
}

#[test]
fn no_data_yet_is_insufficient_not_fatal() {
    struct AlwaysFailing;
    impl Sensor for AlwaysFailing {
        fn metric_id(&self) -> &str {
            "swap_percent"
        }
        fn probe(&self) -> SensorAvailability {
            SensorAvailability::available()
        }
        fn read(&self) -> Result<MetricValue> {
            Err(Error::SensorRead {
                metric: "swap_percent".to_string(),
                reason: "flapping".to_string(),
            })
        }
    }

    let sensors: Vec<Arc<dyn Sensor>> = vec![Arc::new(AlwaysFailing)];
    let mut engine =
        Engine::with_sensors(config(&["swap_percent"], 10, 10), sensors).unwrap();
    thread::sleep(Duration::from_millis(60));
    engine.stop();

    assert!(matches!(
        engine.query("swap_percent", 10),
        Err(Error::InsufficientData(_))
    ));
    // Export still succeeds with a null window for the dark metric.
    let doc = engine.export_json("all").unwrap();
    assert_eq!(doc["swap_percent"]["window"], serde_json::Value::Null);
}
