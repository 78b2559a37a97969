pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Logical direction of travel for a step/dir driver.
///
/// `Increasing` moves the valve toward higher raw position readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// A raw analog channel (ADC counts).
pub trait AnalogInput {
    fn read(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
}

/// Control lines of a step/direction stepper driver.
///
/// Implementations translate logical levels to the wiring (e.g. active-low enable).
pub trait StepDirPins {
    fn set_enabled(
        &mut self,
        energized: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_step(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Byte-oriented point-to-point serial link.
pub trait SerialLink {
    /// Return the next byte, waiting at most `timeout`. `Ok(None)` when nothing arrived.
    fn read_byte(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>>;
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Byte-addressed non-volatile memory (EEPROM-like).
pub trait NonVolatile {
    fn read(
        &mut self,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Write-through: returns only after the bytes are durable.
    fn write(
        &mut self,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
}

impl<T: StepDirPins + ?Sized> StepDirPins for Box<T> {
    fn set_enabled(
        &mut self,
        energized: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_enabled(energized)
    }

    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_direction(dir)
    }

    fn set_step(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_step(high)
    }
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn read_byte(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_byte(timeout)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_all(bytes)
    }
}

impl<T: NonVolatile + ?Sized> NonVolatile for Box<T> {
    fn read(
        &mut self,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(offset, buf)
    }

    fn write(
        &mut self,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(offset, data)
    }
}
