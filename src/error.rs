use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Sensor unavailable for '{metric}': {reason}")]
    SensorUnavailable { metric: String, reason: String },

    #[error("Sensor read failed for '{metric}': {reason}")]
    SensorRead { metric: String, reason: String },

    #[error("No samples recorded for '{0}'")]
    InsufficientData(String),

    #[error("Unknown metric: '{0}'")]
    UnknownMetric(String),
}

pub type Result<T> = std::result::Result<T, Error>;
