//! Piecewise-linear proportional control law with a standby deadband.
//!
//! Response curve (magnitude of the move versus magnitude of the error):
//!
//! ```text
//! response
//!  r_fast ^ . . . . . .__________
//!         |           /
//!         |          / .
//!  r_slow |      ___/  .
//!         |   __/   .  .
//!         +--|------|--|--------> |error|
//!            |      |  e_fast
//!            |      e_slow
//!            e_allowed
//! ```
//!
//! Below `e_slow` the response is linear through the origin (`Kp2`), between
//! `e_slow` and `e_fast` it interpolates between the two response points
//! (`Kp`, `Qp`), and beyond `e_fast` it saturates at `r_fast`.

use crate::error::{BuildError, Result};
use crate::util::round_to_i32;

/// Time budget (seconds) within which a commanded move should complete.
pub const MOVE_BUDGET_S: f32 = 0.25;

/// The five physical thresholds a curve is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    pub e_allowed: f32,
    pub e_slow: f32,
    pub r_slow: f32,
    pub e_fast: f32,
    pub r_fast: f32,
    pub inverted: bool,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            e_allowed: 1.0,
            e_slow: 5.0,
            r_slow: 10.0,
            e_fast: 10.0,
            r_fast: 20.0,
            inverted: false,
        }
    }
}

/// Validated response curve with its derived coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCurve {
    e_allowed: f32,
    e_slow: f32,
    r_slow: f32,
    e_fast: f32,
    r_fast: f32,
    kp: f32,
    qp: f32,
    kp2: f32,
    inverted: bool,
}

impl ControlCurve {
    /// Derive a curve. Requires `0 <= e_allowed < e_slow < e_fast`.
    pub fn new(p: CurveParams) -> std::result::Result<Self, BuildError> {
        let finite = [p.e_allowed, p.e_slow, p.r_slow, p.e_fast, p.r_fast]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(BuildError::InvalidConfig("curve values must be finite"));
        }
        if !(p.e_allowed >= 0.0 && p.e_slow > p.e_allowed && p.e_fast > p.e_slow) {
            return Err(BuildError::InvalidConfig(
                "curve thresholds must satisfy 0 <= e_allowed < e_slow < e_fast",
            ));
        }
        Ok(Self::derive(p))
    }

    fn derive(p: CurveParams) -> Self {
        let kp = (p.r_fast - p.r_slow) / (p.e_fast - p.e_slow);
        Self {
            e_allowed: p.e_allowed,
            e_slow: p.e_slow,
            r_slow: p.r_slow,
            e_fast: p.e_fast,
            r_fast: p.r_fast,
            kp,
            qp: p.r_slow - kp * p.e_slow,
            kp2: p.r_slow / p.e_slow,
            inverted: p.inverted,
        }
    }

    pub fn params(&self) -> CurveParams {
        CurveParams {
            e_allowed: self.e_allowed,
            e_slow: self.e_slow,
            r_slow: self.r_slow,
            e_fast: self.e_fast,
            r_fast: self.r_fast,
            inverted: self.inverted,
        }
    }

    /// Slope of the interpolated zone.
    pub fn kp(&self) -> f32 {
        self.kp
    }

    /// Intercept of the interpolated zone.
    pub fn qp(&self) -> f32 {
        self.qp
    }

    /// Slope of the fine zone.
    pub fn kp2(&self) -> f32 {
        self.kp2
    }

    /// Unsigned move magnitude and speed for `abs_err > e_allowed / 5`.
    fn response(&self, abs_err: f32) -> (i32, f32) {
        if abs_err <= self.e_slow {
            (
                round_to_i32(self.kp2 * abs_err),
                self.r_slow / MOVE_BUDGET_S,
            )
        } else if abs_err >= self.e_fast {
            (round_to_i32(self.r_fast), self.r_fast / MOVE_BUDGET_S)
        } else {
            let mv = round_to_i32(self.qp + self.kp * abs_err);
            (mv, mv as f32 / MOVE_BUDGET_S)
        }
    }
}

impl Default for ControlCurve {
    fn default() -> Self {
        Self::derive(CurveParams::default())
    }
}

/// Hysteresis state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Within the deadband; no output.
    Standby,
    /// Actively commanding motion.
    Adjust,
}

/// One control decision: signed steps and a non-negative rate (steps/s).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Output {
    pub steps: i32,
    pub speed: f32,
}

impl Output {
    pub const IDLE: Output = Output {
        steps: 0,
        speed: 0.0,
    };

    pub fn is_idle(&self) -> bool {
        self.steps == 0
    }
}

/// Stateful proportional controller.
#[derive(Debug, Clone)]
pub struct Controller {
    curve: ControlCurve,
    mode: Mode,
    target: f32,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControlCurve::default())
    }
}

impl Controller {
    pub fn new(curve: ControlCurve) -> Self {
        Self {
            curve,
            mode: Mode::Standby,
            target: 0.0,
        }
    }

    pub fn curve(&self) -> &ControlCurve {
        &self.curve
    }

    /// Replace the curve. On rejection the previous curve stays in effect.
    pub fn reconfigure(&mut self, params: CurveParams) -> Result<()> {
        match ControlCurve::new(params) {
            Ok(curve) => {
                self.curve = curve;
                tracing::info!(?params, "control curve reconfigured");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(?params, error = %e, "control curve rejected; keeping previous");
                Err(eyre::Report::new(e))
            }
        }
    }

    /// Set the desired measured value and force a fresh evaluation.
    pub fn set_target(&mut self, value: f32) {
        self.target = value;
        self.mode = Mode::Adjust;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Compute the move required to bring `measured` toward the target.
    pub fn output(&mut self, measured: f32) -> Output {
        let error = self.target - measured;
        let mut sign = if error < 0.0 { -1 } else { 1 };
        let abs_err = error.abs();
        if self.curve.inverted {
            sign = -sign;
        }

        if self.mode == Mode::Standby {
            if abs_err <= self.curve.e_allowed {
                return Output::IDLE;
            }
            tracing::debug!(error, "leaving standby");
            self.mode = Mode::Adjust;
        }

        if abs_err <= self.curve.e_allowed / 5.0 {
            tracing::debug!(error, "target reached, entering standby");
            self.mode = Mode::Standby;
            return Output::IDLE;
        }

        let (magnitude, speed) = self.curve.response(abs_err);
        Output {
            steps: sign * magnitude,
            speed,
        }
    }
}
