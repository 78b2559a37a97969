#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Backpressure regulator core (hardware-agnostic).
//!
//! A stepper-driven needle valve holds the pressure of a flowing line at a
//! setpoint. All hardware goes through the `bpr_traits` seams.
//!
//! ## Architecture
//!
//! - **Control law**: piecewise-linear response with a standby deadband (`control`)
//! - **Actuator**: step/dir pulse timing (`stepper`) and a position-bounded
//!   wrapper with soft limits and a one-shot fault (`servo`)
//! - **Persistence**: setpoint, calibration and limits at fixed offsets (`store`)
//! - **Protocol**: `S<n>=<v>` / `R<n>` commands over a serial link (`protocol`)
//! - **Device**: the single owned aggregate tying these together (`device`)
//! - **Loop**: stabilize-then-actuate cycle (`runner`)

pub mod builder;
pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod device;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod protocol;
pub mod runner;
pub mod servo;
pub mod stepper;
pub mod store;
pub mod util;

pub use builder::DeviceBuilder;
pub use calibration::{CalibrationPoint, SensorCalibration};
pub use config::{JogCfg, LinkCfg, SamplingCfg, StepperCfg};
pub use control::{ControlCurve, Controller, CurveParams, MOVE_BUDGET_S, Mode, Output};
pub use device::{Device, Motion};
pub use error::{BprError, BuildError, Report, Result};
pub use protocol::{Command, CommandParser, Value, Variable};
pub use runner::{ControlLoop, CycleReport, LoopState, RunSummary};
pub use servo::{BoundedServo, Limits, MotionFault};
pub use stepper::{StepTiming, Stepper};
pub use store::{PersistedState, Store};
