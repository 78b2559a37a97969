//! The regulator as one owned aggregate: controller, actuator, sensors,
//! persisted state and the command protocol.

use std::time::Duration;

use bpr_traits::{AnalogInput, Clock, NonVolatile, SerialLink, StepDirPins};
use eyre::WrapErr;

use crate::calibration::{CalibrationPoint, SensorCalibration};
use crate::config::JogCfg;
use crate::control::{Controller, Output};
use crate::error::Result;
use crate::hw_error::to_report;
use crate::protocol::{self, Command, CommandParser, TEXT_MAX, Value, Variable};
use crate::servo::{BoundedServo, Limits, MotionFault};
use crate::store::{PersistedState, Store};

pub type DynServo =
    BoundedServo<Box<dyn StepDirPins>, Box<dyn AnalogInput>, Box<dyn Clock>>;

/// Result of one motion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    pub requested: i32,
    pub issued: u32,
    pub fault: MotionFault,
}

/// All live regulator state. Built by [`crate::DeviceBuilder`].
pub struct Device {
    pub(crate) controller: Controller,
    pub(crate) servo: DynServo,
    pub(crate) pressure: Box<dyn AnalogInput>,
    pub(crate) calibration: SensorCalibration,
    pub(crate) store: Store<Box<dyn NonVolatile>>,
    pub(crate) parser: CommandParser,
    pub(crate) jog: JogCfg,
    pub(crate) id: String,
    pub(crate) enabled: bool,
    pub(crate) last_pressure: f32,
    pub(crate) cal_start: Option<CalibrationPoint>,
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("target", &self.controller.target())
            .field("mode", &self.controller.mode())
            .field("last_pressure", &self.last_pressure)
            .field("calibration", &self.calibration)
            .field("servo", &self.servo)
            .finish()
    }
}

impl Device {
    pub fn builder() -> crate::DeviceBuilder {
        crate::DeviceBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether automatic regulation may move the valve.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!(enabled, "regulation");
        }
        self.enabled = enabled;
    }

    pub fn setpoint(&self) -> f32 {
        self.controller.target()
    }

    /// Change the setpoint and persist it.
    pub fn set_setpoint(&mut self, bar: f32) -> Result<()> {
        self.controller.set_target(bar);
        tracing::info!(setpoint = bar, "setpoint changed");
        self.store.save_setpoint(bar)
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn calibration(&self) -> SensorCalibration {
        self.calibration
    }

    pub fn limits(&self) -> Limits {
        self.servo.limits()
    }

    /// Pressure published by the last stabilization pass (bar).
    pub fn pressure(&self) -> f32 {
        self.last_pressure
    }

    pub fn publish_pressure(&mut self, bar: f32) {
        self.last_pressure = bar;
    }

    /// Snapshot of everything that is persisted.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            setpoint: self.controller.target(),
            calibration: self.calibration,
            limits: self.servo.limits(),
        }
    }

    pub fn servo_mut(&mut self) -> &mut DynServo {
        &mut self.servo
    }

    pub fn read_pressure_raw(&mut self) -> Result<u16> {
        self.pressure
            .read()
            .map_err(to_report)
            .wrap_err("pressure sensor read")
    }

    /// One calibrated pressure sample (bar).
    pub fn sample_pressure(&mut self) -> Result<f32> {
        let raw = self.read_pressure_raw()?;
        Ok(self.calibration.to_physical(raw))
    }

    pub fn position(&mut self) -> Result<i32> {
        self.servo.position()
    }

    pub fn sleep(&self, d: Duration) {
        self.servo.stepper().clock().sleep(d);
    }

    /// Run the control law against the last published pressure.
    pub fn control_output(&mut self) -> Output {
        self.controller.output(self.last_pressure)
    }

    /// Energize, run a bounded move at `speed`, de-energize.
    ///
    /// A limit fault is logged and consumed here. The driver is
    /// de-energized even if the move fails.
    pub fn drive(&mut self, steps: i32, speed: f32) -> Result<Motion> {
        self.servo.set_speed(speed);
        self.servo.set_enabled(true)?;
        let moved = self.servo.move_steps(steps);
        let released = self.servo.set_enabled(false);
        let issued = moved?;
        released?;
        let fault = self.servo.consume_fault();
        if fault != MotionFault::None {
            tracing::warn!(?fault, requested = steps, issued, "move stopped at soft limit");
        }
        Ok(Motion {
            requested: steps,
            issued,
            fault,
        })
    }

    /// Manual move at the configured jog speed; bypasses the control law.
    pub fn jog(&mut self, steps: i32) -> Result<Motion> {
        tracing::info!(steps, "jog");
        self.drive(steps, self.jog.speed_sps)
    }

    /// Decode and apply every command buffered on `link`. Returns how many
    /// commands were applied.
    pub fn poll_protocol<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<usize> {
        let mut handled = 0;
        while let Some(cmd) = self.parser.next_command(link)? {
            self.apply(cmd, link)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Apply one decoded command, replying on `link` for reads.
    pub fn apply<L: SerialLink + ?Sized>(&mut self, cmd: Command, link: &mut L) -> Result<()> {
        match cmd {
            Command::Read(var) => {
                let value = self.read_variable(var)?;
                protocol::respond(link, &value)
            }
            Command::Set(var, value) => self.write_variable(var, value),
        }
    }

    pub fn read_variable(&mut self, var: Variable) -> Result<Value> {
        Ok(match var {
            Variable::Id => Value::Text(self.id.clone()),
            Variable::Enable => Value::Bool(self.enabled),
            Variable::Setpoint => Value::Float(self.controller.target()),
            Variable::Pressure => Value::Float(self.last_pressure),
            Variable::Position => Value::Int(self.servo.position()?),
            _ => Value::None,
        })
    }

    pub fn write_variable(&mut self, var: Variable, value: Value) -> Result<()> {
        match (var, value) {
            (Variable::Id, Value::Text(mut id)) => {
                truncate_to(&mut id, TEXT_MAX);
                tracing::info!(id = %id, "device id changed");
                self.id = id;
            }
            (Variable::Enable, Value::Bool(on)) => self.set_enabled(on),
            (Variable::Setpoint, Value::Float(bar)) => self.set_setpoint(bar)?,
            (Variable::CalibrationBegin, Value::Float(value)) => self.begin_calibration(value)?,
            (Variable::CalibrationEnd, Value::Float(value)) => self.end_calibration(value)?,
            (Variable::CaptureMin, _) => {
                self.servo.set_current_as_min()?;
                self.persist_limits()?;
            }
            (Variable::CaptureMax, _) => {
                self.servo.set_current_as_max()?;
                self.persist_limits()?;
            }
            (Variable::Jog, Value::Int(steps)) => {
                self.jog(steps)?;
            }
            (var, value) => {
                tracing::debug!(?var, ?value, "ignoring write");
            }
        }
        Ok(())
    }

    /// Record the first calibration sample against a fresh raw reading.
    pub fn begin_calibration(&mut self, value: f32) -> Result<()> {
        let raw = self.read_pressure_raw()?;
        self.cal_start = Some(CalibrationPoint { raw, value });
        tracing::info!(raw, value, "calibration point 1 captured");
        Ok(())
    }

    /// Solve and persist a new calibration from the retained first sample.
    pub fn end_calibration(&mut self, value: f32) -> Result<()> {
        let Some(first) = self.cal_start else {
            tracing::debug!("calibration end without a first point; ignored");
            return Ok(());
        };
        let raw = self.read_pressure_raw()?;
        let second = CalibrationPoint { raw, value };
        match SensorCalibration::from_points(first, second) {
            Some(cal) => {
                self.calibration = cal;
                tracing::info!(m = cal.m, q = cal.q, "calibration updated");
                self.store.save_calibration(&cal)
            }
            None => {
                tracing::warn!(?first, ?second, "degenerate calibration points; ignored");
                Ok(())
            }
        }
    }

    fn persist_limits(&mut self) -> Result<()> {
        let limits = self.servo.limits();
        self.store.save_min(limits.min())?;
        self.store.save_max(limits.max())
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
fn truncate_to(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
