//! `From` implementations bridging `bpr_config` types to `bpr_core` types.

use std::time::Duration;

use crate::calibration::SensorCalibration;
use crate::config::{JogCfg, LinkCfg, SamplingCfg, StepperCfg};
use crate::control::CurveParams;
use crate::servo::Limits;
use crate::store::PersistedState;

// ── CurveParams ──────────────────────────────────────────────────────────────

impl From<&bpr_config::CurveCfg> for CurveParams {
    fn from(c: &bpr_config::CurveCfg) -> Self {
        Self {
            e_allowed: c.e_allowed,
            e_slow: c.e_slow,
            r_slow: c.r_slow,
            e_fast: c.e_fast,
            r_fast: c.r_fast,
            inverted: c.inverted,
        }
    }
}

// ── StepperCfg ───────────────────────────────────────────────────────────────

impl From<&bpr_config::StepperCfg> for StepperCfg {
    fn from(c: &bpr_config::StepperCfg) -> Self {
        Self {
            min_delay_us: c.min_delay_us,
            coarse_threshold_us: c.coarse_threshold_us,
            max_delay_ms: c.max_delay_ms,
            check_every: c.check_every,
        }
    }
}

// ── JogCfg ───────────────────────────────────────────────────────────────────

impl From<&bpr_config::JogCfg> for JogCfg {
    fn from(c: &bpr_config::JogCfg) -> Self {
        Self {
            speed_sps: c.speed_sps,
        }
    }
}

// ── LinkCfg ──────────────────────────────────────────────────────────────────

impl From<&bpr_config::SerialCfg> for LinkCfg {
    fn from(c: &bpr_config::SerialCfg) -> Self {
        Self {
            byte_timeout: Duration::from_millis(c.byte_timeout_ms),
        }
    }
}

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&bpr_config::SamplingCfg> for SamplingCfg {
    fn from(c: &bpr_config::SamplingCfg) -> Self {
        Self {
            samples_per_pass: c.samples_per_pass,
            sample_interval: Duration::from_millis(c.sample_interval_ms),
            noise_threshold_bar: c.noise_threshold_bar,
            divergence_threshold_bar: c.divergence_threshold_bar,
            idle: Duration::from_millis(c.idle_ms),
        }
    }
}

// ── PersistedState (fallbacks) ───────────────────────────────────────────────

impl From<&bpr_config::Fallbacks> for PersistedState {
    fn from(c: &bpr_config::Fallbacks) -> Self {
        Self {
            setpoint: c.setpoint_bar,
            calibration: SensorCalibration::new(c.calibration_m, c.calibration_q),
            limits: Limits::new(c.pos_min, c.pos_max),
        }
    }
}
