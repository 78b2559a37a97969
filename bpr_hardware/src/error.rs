use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("uart error: {0}")]
    Uart(String),
    #[error("adc read timeout")]
    Timeout,
    #[error("serial link disconnected")]
    Disconnected,
    #[error("store access out of range: offset {offset} len {len} (capacity {capacity})")]
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
