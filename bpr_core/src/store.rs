//! Persisted setpoint, calibration and travel limits.
//!
//! Fixed little-endian layout:
//!
//! | offset | field    | type |
//! |--------|----------|------|
//! | 0      | setpoint | f32  |
//! | 4      | m        | f32  |
//! | 8      | q        | f32  |
//! | 12     | pos_max  | i32  |
//! | 16     | pos_min  | i32  |
//!
//! Each field is written through as soon as it changes. There is no checksum;
//! values are sanity-checked on load instead.

use bpr_traits::NonVolatile;
use eyre::WrapErr;

use crate::calibration::SensorCalibration;
use crate::error::Result;
use crate::hw_error::to_report;
use crate::servo::Limits;

pub const SETPOINT_OFFSET: usize = 0;
pub const CAL_M_OFFSET: usize = 4;
pub const CAL_Q_OFFSET: usize = 8;
pub const POS_MAX_OFFSET: usize = 12;
pub const POS_MIN_OFFSET: usize = 16;
/// Bytes occupied by the record.
pub const RECORD_LEN: usize = 20;

const POSITION_RANGE: std::ops::RangeInclusive<i32> = 0..=1023;

/// Everything that survives a power cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedState {
    pub setpoint: f32,
    pub calibration: SensorCalibration,
    pub limits: Limits,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            setpoint: 0.0,
            calibration: SensorCalibration::default(),
            limits: Limits::default(),
        }
    }
}

/// Typed access to the record in a [`NonVolatile`] backend.
#[derive(Debug)]
pub struct Store<N: NonVolatile> {
    nvm: N,
}

impl<N: NonVolatile> Store<N> {
    pub fn new(nvm: N) -> Self {
        Self { nvm }
    }

    pub fn into_inner(self) -> N {
        self.nvm
    }

    /// Read the record, replacing implausible fields with `fallback`.
    ///
    /// An erased store (all `0xFF`) reads as NaN floats and `-1` limits, so it
    /// boots entirely from `fallback`.
    pub fn load(&mut self, fallback: &PersistedState) -> Result<PersistedState> {
        let mut buf = [0u8; RECORD_LEN];
        self.nvm
            .read(0, &mut buf)
            .map_err(to_report)
            .wrap_err("reading persisted state")?;

        let setpoint = f32_at(&buf, SETPOINT_OFFSET);
        let m = f32_at(&buf, CAL_M_OFFSET);
        let q = f32_at(&buf, CAL_Q_OFFSET);
        let pos_max = i32_at(&buf, POS_MAX_OFFSET);
        let pos_min = i32_at(&buf, POS_MIN_OFFSET);

        let mut state = *fallback;
        if setpoint.is_finite() {
            state.setpoint = setpoint;
        } else {
            tracing::warn!(setpoint, "stored setpoint invalid; using default");
        }
        if m.is_finite() && q.is_finite() && m != 0.0 {
            state.calibration = SensorCalibration::new(m, q);
        } else {
            tracing::warn!(m, q, "stored calibration invalid; using default");
        }
        if POSITION_RANGE.contains(&pos_min) && POSITION_RANGE.contains(&pos_max) {
            state.limits = Limits::new(pos_min, pos_max);
        } else {
            tracing::warn!(pos_min, pos_max, "stored limits invalid; using default");
        }
        tracing::debug!(?state, "persisted state loaded");
        Ok(state)
    }

    pub fn save_setpoint(&mut self, setpoint: f32) -> Result<()> {
        self.put(SETPOINT_OFFSET, &setpoint.to_le_bytes())
            .wrap_err("persisting setpoint")
    }

    pub fn save_calibration(&mut self, cal: &SensorCalibration) -> Result<()> {
        self.put(CAL_M_OFFSET, &cal.m.to_le_bytes())
            .and_then(|()| self.put(CAL_Q_OFFSET, &cal.q.to_le_bytes()))
            .wrap_err("persisting calibration")
    }

    pub fn save_max(&mut self, pos_max: i32) -> Result<()> {
        self.put(POS_MAX_OFFSET, &pos_max.to_le_bytes())
            .wrap_err("persisting upper limit")
    }

    pub fn save_min(&mut self, pos_min: i32) -> Result<()> {
        self.put(POS_MIN_OFFSET, &pos_min.to_le_bytes())
            .wrap_err("persisting lower limit")
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.nvm.write(offset, bytes).map_err(to_report)
    }
}

fn f32_at(buf: &[u8; RECORD_LEN], offset: usize) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[offset..offset + 4]);
    f32::from_le_bytes(b)
}

fn i32_at(buf: &[u8; RECORD_LEN], offset: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(b)
}
