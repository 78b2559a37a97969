//! Builder for [`Device`]: collects collaborators and configuration, then
//! boots the device (actuator rest state, persisted state restored).

use bpr_traits::clock::{Clock, MonotonicClock};
use bpr_traits::{AnalogInput, NonVolatile, StepDirPins};

use crate::config::{JogCfg, LinkCfg, StepperCfg};
use crate::control::{ControlCurve, Controller, CurveParams};
use crate::device::Device;
use crate::error::{BuildError, Result};
use crate::protocol::{CommandParser, TEXT_MAX};
use crate::servo::BoundedServo;
use crate::stepper::Stepper;
use crate::store::{PersistedState, Store};

/// Builder for `Device`. Collaborators are checked on `build()`.
#[derive(Default)]
pub struct DeviceBuilder {
    driver: Option<Box<dyn StepDirPins>>,
    position: Option<Box<dyn AnalogInput>>,
    pressure: Option<Box<dyn AnalogInput>>,
    store: Option<Box<dyn NonVolatile>>,
    clock: Option<Box<dyn Clock>>,
    curve: Option<CurveParams>,
    stepper: Option<StepperCfg>,
    jog: Option<JogCfg>,
    link: Option<LinkCfg>,
    fallback: Option<PersistedState>,
    id: Option<String>,
    start_enabled: bool,
}

impl DeviceBuilder {
    pub fn with_driver(mut self, driver: impl StepDirPins + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    pub fn with_position_sensor(mut self, sensor: impl AnalogInput + 'static) -> Self {
        self.position = Some(Box::new(sensor));
        self
    }

    pub fn with_pressure_sensor(mut self, sensor: impl AnalogInput + 'static) -> Self {
        self.pressure = Some(Box::new(sensor));
        self
    }

    pub fn with_store(mut self, store: impl NonVolatile + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Defaults to [`MonotonicClock`].
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn with_curve(mut self, curve: CurveParams) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn with_stepper(mut self, stepper: StepperCfg) -> Self {
        self.stepper = Some(stepper);
        self
    }

    pub fn with_jog(mut self, jog: JogCfg) -> Self {
        self.jog = Some(jog);
        self
    }

    pub fn with_link(mut self, link: LinkCfg) -> Self {
        self.link = Some(link);
        self
    }

    /// Values used for any persisted field that is erased or implausible.
    pub fn with_fallback(mut self, fallback: PersistedState) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_start_enabled(mut self, enabled: bool) -> Self {
        self.start_enabled = enabled;
        self
    }

    /// Validate, put the actuator at rest and restore persisted state.
    pub fn build(self) -> Result<Device> {
        let driver = self
            .driver
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDriver))?;
        let position = self
            .position
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPositionSensor))?;
        let pressure = self
            .pressure
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPressureSensor))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;

        let curve = ControlCurve::new(self.curve.unwrap_or_default()).map_err(eyre::Report::new)?;
        let stepper_cfg = self.stepper.unwrap_or_default();
        if stepper_cfg.check_every == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "check_every must be >= 1",
            )));
        }
        let jog = self.jog.unwrap_or_default();
        if !(jog.speed_sps.is_finite() && jog.speed_sps > 0.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "jog speed must be > 0",
            )));
        }
        let id = self.id.unwrap_or_else(|| "BPR".to_string());
        if id.len() > TEXT_MAX {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "device id longer than 20 bytes",
            )));
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let fallback = self.fallback.unwrap_or_default();
        let link = self.link.unwrap_or_default();

        let mut servo = BoundedServo::new(
            Stepper::new(driver, clock, stepper_cfg),
            position,
            fallback.limits,
        );
        servo.initialize()?;

        let mut store = Store::new(store);
        let restored = store.load(&fallback)?;
        servo.set_limits(restored.limits.min(), restored.limits.max());

        let mut controller = Controller::new(curve);
        controller.set_target(restored.setpoint);

        tracing::info!(
            id = %id,
            setpoint = restored.setpoint,
            m = restored.calibration.m,
            q = restored.calibration.q,
            pos_min = restored.limits.min(),
            pos_max = restored.limits.max(),
            "device ready"
        );

        Ok(Device {
            controller,
            servo,
            pressure,
            calibration: restored.calibration,
            store,
            parser: CommandParser::new(link.byte_timeout),
            jog,
            id,
            enabled: self.start_enabled,
            last_pressure: 0.0,
            cal_start: None,
        })
    }
}
