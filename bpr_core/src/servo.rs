//! Position-aware stepper: soft limits checked in batches against a
//! potentiometer on the valve spindle.

use bpr_traits::{AnalogInput, Clock, Direction, StepDirPins};
use eyre::WrapErr;

use crate::error::{BprError, Result};
use crate::hw_error::to_report;
use crate::stepper::{Stepper, StepTiming, direction_of};

/// `move_to` gives up after this many batches without the position changing.
pub const STALL_BATCHES: u32 = 200;

/// Soft travel limits in raw position counts. Always `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    min: i32,
    max: i32,
}

impl Limits {
    /// Build limits, swapping the arguments if they are out of order.
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Midpoint of the travel window.
    pub fn middle(&self) -> i32 {
        self.min + (self.max - self.min) / 2
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self { min: 0, max: 1023 }
    }
}

/// Why the last bounded move stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionFault {
    #[default]
    None,
    HitMax,
    HitMin,
}

/// Stepper plus position feedback and soft limits.
pub struct BoundedServo<P: StepDirPins, S: AnalogInput, C: Clock> {
    stepper: Stepper<P, C>,
    sensor: S,
    limits: Limits,
    fault: MotionFault,
}

impl<P: StepDirPins, S: AnalogInput, C: Clock> core::fmt::Debug for BoundedServo<P, S, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundedServo")
            .field("stepper", &self.stepper)
            .field("limits", &self.limits)
            .field("fault", &self.fault)
            .finish()
    }
}

impl<P: StepDirPins, S: AnalogInput, C: Clock> BoundedServo<P, S, C> {
    pub fn new(stepper: Stepper<P, C>, sensor: S, limits: Limits) -> Self {
        Self {
            stepper,
            sensor,
            limits,
            fault: MotionFault::None,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.stepper.initialize()
    }

    pub fn set_enabled(&mut self, energized: bool) -> Result<()> {
        self.stepper.set_enabled(energized)
    }

    pub fn set_speed(&mut self, steps_per_sec: f32) -> StepTiming {
        self.stepper.set_speed(steps_per_sec)
    }

    pub fn stepper(&self) -> &Stepper<P, C> {
        &self.stepper
    }

    /// Raw position reading.
    pub fn position(&mut self) -> Result<i32> {
        let raw = self
            .sensor
            .read()
            .map_err(to_report)
            .wrap_err("position sensor read")?;
        Ok(i32::from(raw))
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Replace both limits, normalizing their order.
    pub fn set_limits(&mut self, min: i32, max: i32) {
        self.limits = Limits::new(min, max);
    }

    /// Capture the current position as the upper limit and return it.
    ///
    /// If the position lies below the current minimum the two are swapped.
    pub fn set_current_as_max(&mut self) -> Result<i32> {
        let pos = self.position()?;
        self.limits = Limits::new(self.limits.min, pos);
        tracing::info!(pos, limits = ?self.limits, "upper limit captured");
        Ok(pos)
    }

    /// Capture the current position as the lower limit and return it.
    pub fn set_current_as_min(&mut self) -> Result<i32> {
        let pos = self.position()?;
        self.limits = Limits::new(pos, self.limits.max);
        tracing::info!(pos, limits = ?self.limits, "lower limit captured");
        Ok(pos)
    }

    /// Move by `steps`, checking the limits before each batch of
    /// `check_every` pulses. Returns how many steps were issued.
    ///
    /// Stopping at a limit records a [`MotionFault`] instead of failing.
    pub fn move_steps(&mut self, steps: i32) -> Result<u32> {
        let dir = direction_of(steps);
        self.stepper.set_direction(dir)?;

        let total = steps.unsigned_abs();
        let batch = self.stepper.cfg().check_every.max(1);
        let mut issued = 0u32;
        while issued < total {
            let pos = self.position()?;
            let hit = match dir {
                Direction::Increasing if pos >= self.limits.max => Some(MotionFault::HitMax),
                Direction::Decreasing if pos <= self.limits.min => Some(MotionFault::HitMin),
                _ => None,
            };
            if let Some(fault) = hit {
                tracing::warn!(pos, ?fault, issued, requested = steps, "bounded move stopped at limit");
                self.fault = fault;
                break;
            }
            let n = batch.min(total - issued);
            self.stepper.pulse(n)?;
            issued += n;
            tracing::trace!(issued, total, "batch done");
        }
        Ok(issued)
    }

    /// Drive toward `target` in whole batches until the sampled position
    /// reaches or passes it. Soft limits are not consulted.
    /// Returns the final sampled position.
    pub fn move_to(&mut self, target: i32) -> Result<i32> {
        let mut pos = self.position()?;
        if pos == target {
            return Ok(pos);
        }
        let dir = if target > pos {
            Direction::Increasing
        } else {
            Direction::Decreasing
        };
        self.stepper.set_direction(dir)?;

        let batch = self.stepper.cfg().check_every.max(1);
        let mut stalled = 0u32;
        loop {
            self.stepper.pulse(batch)?;
            let next = self.position()?;
            let reached = match dir {
                Direction::Increasing => next >= target,
                Direction::Decreasing => next <= target,
            };
            if reached {
                tracing::debug!(target, pos = next, "move_to reached");
                return Ok(next);
            }
            if next == pos {
                stalled += 1;
                if stalled >= STALL_BATCHES {
                    return Err(eyre::Report::new(BprError::HardwareFault(format!(
                        "move_to {target} stalled at {next}"
                    ))));
                }
            } else {
                stalled = 0;
            }
            pos = next;
        }
    }

    /// Return the last fault and clear it.
    pub fn consume_fault(&mut self) -> MotionFault {
        std::mem::take(&mut self.fault)
    }
}
