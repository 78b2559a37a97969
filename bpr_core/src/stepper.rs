//! Open-loop step/direction pulse generation.

use std::time::Duration;

use bpr_traits::{Clock, Direction, StepDirPins};
use eyre::WrapErr;

use crate::config::StepperCfg;
use crate::error::Result;
use crate::hw_error::to_report;
use crate::util::half_period_us;

/// Delay between step edges, chosen once per `set_speed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTiming {
    /// Microsecond half-period for fast rates.
    Fine { us: u32 },
    /// Millisecond half-period for slow rates.
    Coarse { ms: u32 },
}

impl StepTiming {
    /// Select timing for a rate in steps/s (sign ignored).
    ///
    /// Rates too fast for the driver are capped at `min_delay_us`, rates
    /// slower than `max_delay_ms` per edge are raised to it. Half-periods
    /// under one millisecond always use microsecond timing.
    pub fn from_speed(steps_per_sec: f32, cfg: &StepperCfg) -> Self {
        let half = half_period_us(steps_per_sec);
        if half < f64::from(cfg.coarse_threshold_us.max(1000)) {
            let us = (half as u32).max(cfg.min_delay_us);
            StepTiming::Fine { us }
        } else {
            let ms = (half / 1000.0).min(f64::from(cfg.max_delay_ms)) as u32;
            StepTiming::Coarse { ms: ms.max(1) }
        }
    }

    pub fn half_period(&self) -> Duration {
        match *self {
            StepTiming::Fine { us } => Duration::from_micros(u64::from(us)),
            StepTiming::Coarse { ms } => Duration::from_millis(u64::from(ms)),
        }
    }

    /// Effective rate produced by this timing.
    pub fn steps_per_sec(&self) -> f32 {
        let half = self.half_period().as_secs_f32();
        if half == 0.0 { 0.0 } else { 0.5 / half }
    }
}

impl Default for StepTiming {
    fn default() -> Self {
        StepTiming::Fine { us: 500 }
    }
}

/// Blocking stepper driver with no position awareness.
pub struct Stepper<P: StepDirPins, C: Clock> {
    pins: P,
    clock: C,
    cfg: StepperCfg,
    timing: StepTiming,
    enabled: bool,
}

impl<P: StepDirPins, C: Clock> core::fmt::Debug for Stepper<P, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stepper")
            .field("timing", &self.timing)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<P: StepDirPins, C: Clock> Stepper<P, C> {
    pub fn new(pins: P, clock: C, cfg: StepperCfg) -> Self {
        Self {
            pins,
            clock,
            cfg,
            timing: StepTiming::default(),
            enabled: false,
        }
    }

    /// Put the lines in their rest state: disabled, direction decreasing, step low.
    pub fn initialize(&mut self) -> Result<()> {
        self.pins
            .set_enabled(false)
            .map_err(to_report)
            .wrap_err("stepper init: enable line")?;
        self.pins
            .set_direction(Direction::Decreasing)
            .map_err(to_report)
            .wrap_err("stepper init: dir line")?;
        self.pins
            .set_step(false)
            .map_err(to_report)
            .wrap_err("stepper init: step line")?;
        self.enabled = false;
        Ok(())
    }

    pub fn set_enabled(&mut self, energized: bool) -> Result<()> {
        self.pins
            .set_enabled(energized)
            .map_err(to_report)
            .wrap_err("set_enabled")?;
        if self.enabled != energized {
            tracing::trace!(energized, "stepper driver");
        }
        self.enabled = energized;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Convert a rate (steps/s) into pulse timing; returns the selected timing.
    pub fn set_speed(&mut self, steps_per_sec: f32) -> StepTiming {
        self.timing = StepTiming::from_speed(steps_per_sec, &self.cfg);
        tracing::trace!(steps_per_sec, timing = ?self.timing, "stepper speed");
        self.timing
    }

    pub fn timing(&self) -> StepTiming {
        self.timing
    }

    pub fn cfg(&self) -> &StepperCfg {
        &self.cfg
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Move by `steps` (positive = increasing). Blocks until every pulse is out.
    pub fn move_steps(&mut self, steps: i32) -> Result<()> {
        let dir = direction_of(steps);
        self.set_direction(dir)?;
        self.pulse(steps.unsigned_abs())
    }

    pub(crate) fn set_direction(&mut self, dir: Direction) -> Result<()> {
        self.pins
            .set_direction(dir)
            .map_err(to_report)
            .wrap_err("set_direction")
    }

    /// Emit `n` full step pulses at the configured timing.
    pub(crate) fn pulse(&mut self, n: u32) -> Result<()> {
        let half = self.timing.half_period();
        for _ in 0..n {
            self.pins
                .set_step(true)
                .map_err(to_report)
                .wrap_err("step high")?;
            self.clock.sleep(half);
            self.pins
                .set_step(false)
                .map_err(to_report)
                .wrap_err("step low")?;
            self.clock.sleep(half);
        }
        Ok(())
    }
}

/// Direction for a signed step count; zero counts as decreasing (rest state).
#[inline]
pub fn direction_of(steps: i32) -> Direction {
    if steps > 0 {
        Direction::Increasing
    } else {
        Direction::Decreasing
    }
}
