#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the backpressure regulator.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` has defaults, so a minimal file only
//!   names the wiring.
use serde::Deserialize;

/// Longest device identifier accepted on the wire.
pub const DEVICE_ID_MAX: usize = 20;
/// Full scale of the 10-bit position/pressure converters.
pub const ADC_MAX: i32 = 1023;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Identifier reported through variable 1.
    pub id: String,
    /// Whether automatic regulation is enabled at boot.
    pub start_enabled: bool,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            id: "BPR".to_string(),
            start_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub step: u8,
    pub dir: u8,
    pub enable: u8,
    /// MCP3008 channel wired to the pressure transducer
    #[serde(default)]
    pub adc_pressure_channel: u8,
    /// MCP3008 channel wired to the spindle potentiometer
    #[serde(default = "default_position_channel")]
    pub adc_position_channel: u8,
    /// UART device for the command link (hardware builds); stdin/stdout otherwise
    pub uart: Option<String>,
}

fn default_position_channel() -> u8 {
    1
}

/// Control law response curve.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CurveCfg {
    /// Within this error (bar) the controller stays in standby
    pub e_allowed: f32,
    /// Below this error the fine, linear-through-origin response applies
    pub e_slow: f32,
    /// Response (steps) at `e_slow`
    pub r_slow: f32,
    /// Beyond this error the response saturates at `r_fast`
    pub e_fast: f32,
    /// Maximum response (steps)
    pub r_fast: f32,
    /// Flip the direction of every move
    pub inverted: bool,
}

impl Default for CurveCfg {
    fn default() -> Self {
        Self {
            e_allowed: 0.05,
            e_slow: 0.6,
            r_slow: 10.0,
            e_fast: 2.5,
            r_fast: 800.0,
            inverted: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StepperCfg {
    /// Shortest half-period between step edges (caps top speed)
    pub min_delay_us: u32,
    /// Half-periods at or above this switch to millisecond timing
    pub coarse_threshold_us: u32,
    /// Longest half-period (caps the slowest rate)
    pub max_delay_ms: u32,
    /// Bounded moves re-sample position every this many pulses
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

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct JogCfg {
    /// Speed used by the manual jog command (steps per second)
    pub speed_sps: f32,
}

impl Default for JogCfg {
    fn default() -> Self {
        Self { speed_sps: 1000.0 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SamplingCfg {
    pub samples_per_pass: u32,
    pub sample_interval_ms: u64,
    /// Passes repeat while consecutive averages differ by more than this (bar)
    pub noise_threshold_bar: f32,
    /// ...unless the average is further than this from the setpoint (bar)
    pub divergence_threshold_bar: f32,
    /// Pause after a cycle that produced no motion
    pub idle_ms: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            samples_per_pass: 10,
            sample_interval_ms: 20,
            noise_threshold_bar: 0.02,
            divergence_threshold_bar: 1.0,
            idle_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SerialCfg {
    pub baud: u32,
    /// Per-byte wait while reading a textual value
    pub byte_timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            baud: 9600,
            byte_timeout_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Path of the persisted calibration/limits image
    pub path: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: "bpr.nvm".to_string(),
        }
    }
}

/// Values used when the persisted store is erased or holds garbage.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Fallbacks {
    pub setpoint_bar: f32,
    pub calibration_m: f32,
    pub calibration_q: f32,
    pub pos_min: i32,
    pub pos_max: i32,
}

impl Default for Fallbacks {
    fn default() -> Self {
        Self {
            setpoint_bar: 0.0,
            calibration_m: 0.0489,
            calibration_q: -1.955,
            pos_min: 0,
            pos_max: ADC_MAX,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Simulated rig parameters (ignored by hardware builds).
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimCfg {
    pub start_position: f32,
    pub counts_per_step: f32,
    pub pressure_offset: f32,
    pub pressure_gain: f32,
    pub pressure_noise: f32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            start_position: 300.0,
            counts_per_step: 0.05,
            pressure_offset: 40.0,
            pressure_gain: 0.5,
            pressure_noise: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: Device,
    pub pins: Pins,
    #[serde(default)]
    pub curve: CurveCfg,
    #[serde(default)]
    pub stepper: StepperCfg,
    #[serde(default)]
    pub jog: JogCfg,
    #[serde(default)]
    pub sampling: SamplingCfg,
    #[serde(default)]
    pub serial: SerialCfg,
    #[serde(default)]
    pub storage: Storage,
    /// Fallbacks for an erased/corrupt store
    #[serde(default)]
    pub defaults: Fallbacks,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn finite_all(vals: &[f32]) -> bool {
    vals.iter().all(|v| v.is_finite())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.id.len() > DEVICE_ID_MAX || !self.device.id.is_ascii() {
            eyre::bail!("device.id must be ASCII and at most {DEVICE_ID_MAX} bytes");
        }

        // Pins
        if self.pins.adc_pressure_channel > 7 || self.pins.adc_position_channel > 7 {
            eyre::bail!("pins.adc_*_channel must be in 0..=7");
        }
        if self.pins.adc_pressure_channel == self.pins.adc_position_channel {
            eyre::bail!("pins.adc_pressure_channel and pins.adc_position_channel must differ");
        }

        // Curve
        let c = &self.curve;
        if !finite_all(&[c.e_allowed, c.e_slow, c.r_slow, c.e_fast, c.r_fast]) {
            eyre::bail!("curve values must be finite");
        }
        if c.e_allowed < 0.0 {
            eyre::bail!("curve.e_allowed must be >= 0");
        }
        if c.e_slow <= c.e_allowed {
            eyre::bail!("curve.e_slow must be > curve.e_allowed");
        }
        if c.e_fast <= c.e_slow {
            eyre::bail!("curve.e_fast must be > curve.e_slow");
        }
        if c.r_slow <= 0.0 {
            eyre::bail!("curve.r_slow must be > 0");
        }
        if c.r_fast <= c.r_slow {
            eyre::bail!("curve.r_fast must be > curve.r_slow");
        }

        // Stepper
        if self.stepper.min_delay_us == 0 {
            eyre::bail!("stepper.min_delay_us must be >= 1");
        }
        if self.stepper.coarse_threshold_us <= self.stepper.min_delay_us {
            eyre::bail!("stepper.coarse_threshold_us must be > stepper.min_delay_us");
        }
        if self.stepper.coarse_threshold_us < 1000 {
            eyre::bail!("stepper.coarse_threshold_us must be >= 1000 (coarse timing has 1 ms resolution)");
        }
        if self.stepper.max_delay_ms == 0 {
            eyre::bail!("stepper.max_delay_ms must be >= 1");
        }
        if self.stepper.check_every == 0 {
            eyre::bail!("stepper.check_every must be >= 1");
        }

        // Jog
        if !(self.jog.speed_sps.is_finite() && self.jog.speed_sps > 0.0) {
            eyre::bail!("jog.speed_sps must be > 0");
        }

        // Sampling
        let s = &self.sampling;
        if s.samples_per_pass == 0 {
            eyre::bail!("sampling.samples_per_pass must be >= 1");
        }
        if s.sample_interval_ms > 10_000 {
            eyre::bail!("sampling.sample_interval_ms is unreasonably large (>10s)");
        }
        if !finite_all(&[s.noise_threshold_bar, s.divergence_threshold_bar])
            || s.noise_threshold_bar < 0.0
            || s.divergence_threshold_bar < 0.0
        {
            eyre::bail!("sampling thresholds must be finite and >= 0");
        }

        // Serial
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.byte_timeout_ms == 0 {
            eyre::bail!("serial.byte_timeout_ms must be >= 1");
        }

        // Storage
        if self.storage.path.trim().is_empty() {
            eyre::bail!("storage.path must not be empty");
        }

        // Fallbacks
        let d = &self.defaults;
        if !finite_all(&[d.setpoint_bar, d.calibration_m, d.calibration_q]) {
            eyre::bail!("defaults must be finite");
        }
        if d.calibration_m == 0.0 {
            eyre::bail!("defaults.calibration_m must be non-zero");
        }
        if !(0..=ADC_MAX).contains(&d.pos_min)
            || !(0..=ADC_MAX).contains(&d.pos_max)
            || d.pos_min > d.pos_max
        {
            eyre::bail!("defaults.pos_min/pos_max must satisfy 0 <= min <= max <= {ADC_MAX}");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Sim
        if !(self.sim.counts_per_step.is_finite() && self.sim.counts_per_step > 0.0) {
            eyre::bail!("sim.counts_per_step must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[pins]
step = 13
dir = 19
enable = 26
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = load_toml(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.device.id, "BPR");
        assert_eq!(cfg.pins.adc_position_channel, 1);
        assert_eq!(cfg.stepper.check_every, 100);
        assert_eq!(cfg.serial.baud, 9600);
        assert!(cfg.pins.uart.is_none());
    }

    #[test]
    fn missing_pins_is_a_parse_error() {
        assert!(load_toml("[curve]\ne_allowed = 0.1\n").is_err());
    }
}
