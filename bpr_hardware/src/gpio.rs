//! Step/dir/enable driver lines on Raspberry Pi GPIO.

use bpr_traits::{Direction, StepDirPins};
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};

/// A4988/DRV8825-style driver: enable is active-low, DIR low = increasing.
pub struct GpioStepDir {
    step: OutputPin,
    dir: OutputPin,
    enable: OutputPin,
}

impl GpioStepDir {
    pub fn new(step_pin: u8, dir_pin: u8, enable_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let open = |pin: u8| -> Result<OutputPin> {
            gpio.get(pin)
                .map(|p| p.into_output())
                .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))
        };
        let mut step = open(step_pin)?;
        let mut dir = open(dir_pin)?;
        let mut enable = open(enable_pin)?;
        // Rest state: disabled, direction decreasing, step idle low.
        enable.set_high();
        dir.set_high();
        step.set_low();
        tracing::debug!(step_pin, dir_pin, enable_pin, "stepper lines configured");
        Ok(Self { step, dir, enable })
    }
}

impl StepDirPins for GpioStepDir {
    fn set_enabled(
        &mut self,
        energized: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if energized {
            self.enable.set_low();
        } else {
            self.enable.set_high();
        }
        Ok(())
    }

    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match dir {
            Direction::Increasing => self.dir.set_low(),
            Direction::Decreasing => self.dir.set_high(),
        }
        Ok(())
    }

    fn set_step(
        &mut self,
        high: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if high {
            self.step.set_high();
        } else {
            self.step.set_low();
        }
        Ok(())
    }
}
