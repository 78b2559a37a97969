use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum BprError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("missing stepper driver")]
    MissingDriver,
    #[error("missing position sensor")]
    MissingPositionSensor,
    #[error("missing pressure sensor")]
    MissingPressureSensor,
    #[error("missing non-volatile store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
