pub mod aggregate;
pub mod config;
pub mod derived;
pub mod engine;
pub mod error;
pub mod export;
pub mod sampler;
pub mod sensors;
pub mod store;

pub use aggregate::AggregationWindow;
pub use config::Config;
pub use derived::{DerivedReport, EmissionsEstimate, HostInfo, PowerEstimate};
pub use engine::Engine;
pub use error::{Error, Result};
pub use sensors::{MetricSample, MetricValue, Sensor, SensorAvailability};
