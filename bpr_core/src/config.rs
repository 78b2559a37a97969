//! Runtime configuration for the actuator, protocol and control loop.
//!
//! These are separate from the TOML-deserialized config in `bpr_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

/// Stepper pulse timing and bounded-move batching.
#[derive(Debug, Clone, Copy)]
pub struct StepperCfg {
    /// Shortest half-period (µs); caps top speed.
    pub min_delay_us: u32,
    /// Half-periods below this use microsecond timing, others millisecond timing.
    pub coarse_threshold_us: u32,
    /// Longest half-period (ms); caps the slowest rate.
    pub max_delay_ms: u32,
    /// Bounded moves re-sample position every this many pulses.
    pub check_every: u32,
}

impl Default for StepperCfg {
    fn default() -> Self {
        Self {
            min_delay_us: 100,
            coarse_threshold_us: 15_000,
            max_delay_ms: 100,
            check_every: 100,
        }
    }
}

/// Manual jog (variable 10).
#[derive(Debug, Clone, Copy)]
pub struct JogCfg {
    pub speed_sps: f32,
}

impl Default for JogCfg {
    fn default() -> Self {
        Self { speed_sps: 1000.0 }
    }
}

/// Command link timing.
#[derive(Debug, Clone, Copy)]
pub struct LinkCfg {
    /// Wait per byte while reading a textual value.
    pub byte_timeout: Duration,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            byte_timeout: Duration::from_millis(10),
        }
    }
}

/// Stabilization and actuation pacing.
#[derive(Debug, Clone, Copy)]
pub struct SamplingCfg {
    pub samples_per_pass: u32,
    pub sample_interval: Duration,
    /// Repeat a pass while consecutive averages differ by more than this (bar).
    pub noise_threshold_bar: f32,
    /// Stop stabilizing once the average is further than this from the setpoint (bar).
    pub divergence_threshold_bar: f32,
    pub idle: Duration,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            samples_per_pass: 10,
            sample_interval: Duration::from_millis(20),
            noise_threshold_bar: 0.02,
            divergence_threshold_bar: 1.0,
            idle: Duration::from_millis(100),
        }
    }
}
