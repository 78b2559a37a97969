//! Simulated valve rig: a stepper-driven needle valve with a potentiometer on
//! the spindle and a pressure transducer downstream.
//!
//! All handles share one rig state, so pulses issued through the driver are
//! visible to both sensors. Single-threaded by construction (`Rc`).

use std::cell::RefCell;
use std::rc::Rc;

use bpr_traits::{AnalogInput, Direction, StepDirPins};

use crate::error::HwError;

/// Full-scale reading of the 10-bit converters.
pub const ADC_MAX: u16 = 1023;

/// Physical parameters of the simulated rig.
#[derive(Debug, Clone, Copy)]
pub struct RigParams {
    /// Starting spindle position in raw counts.
    pub start_position: f32,
    /// Potentiometer counts travelled per motor step.
    pub counts_per_step: f32,
    /// Pressure transducer reading with the valve fully open (raw counts).
    pub pressure_offset: f32,
    /// Pressure counts gained per position count as the valve closes.
    pub pressure_gain: f32,
    /// Peak-to-peak noise added to pressure readings (raw counts).
    pub pressure_noise: f32,
}

impl Default for RigParams {
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

#[derive(Debug)]
struct RigState {
    params: RigParams,
    position: f32,
    energized: bool,
    direction: Direction,
    step_high: bool,
    pulses: u64,
    fail_reads: bool,
    rng: u32,
}

impl RigState {
    fn next_noise(&mut self) -> f32 {
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let unit = (x as f32) / (u32::MAX as f32 + 1.0);
        (unit - 0.5) * self.params.pressure_noise
    }

    fn pressure_raw(&mut self) -> u16 {
        let base = self.params.pressure_offset + self.params.pressure_gain * self.position;
        let noisy = base + self.next_noise();
        noisy.round().clamp(0.0, ADC_MAX as f32) as u16
    }
}

/// Shared handle on the simulated rig.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    state: Rc<RefCell<RigState>>,
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new(RigParams::default())
    }
}

impl SimulatedRig {
    pub fn new(params: RigParams) -> Self {
        let position = params.start_position.clamp(0.0, ADC_MAX as f32);
        Self {
            state: Rc::new(RefCell::new(RigState {
                params,
                position,
                energized: false,
                direction: Direction::Decreasing,
                step_high: false,
                pulses: 0,
                fail_reads: false,
                rng: 0x2545_F491,
            })),
        }
    }

    /// Driver handle (step/dir/enable lines).
    pub fn driver(&self) -> SimulatedDriver {
        SimulatedDriver {
            state: self.state.clone(),
        }
    }

    /// Potentiometer on the valve spindle.
    pub fn position_sensor(&self) -> SimulatedSensor {
        SimulatedSensor {
            state: self.state.clone(),
            kind: SensorKind::Position,
        }
    }

    /// Pressure transducer.
    pub fn pressure_sensor(&self) -> SimulatedSensor {
        SimulatedSensor {
            state: self.state.clone(),
            kind: SensorKind::Pressure,
        }
    }

    /// Current spindle position (raw counts, unrounded).
    pub fn position(&self) -> f32 {
        self.state.borrow().position
    }

    /// Teleport the spindle (test setup).
    pub fn set_position(&self, position: f32) {
        self.state.borrow_mut().position = position.clamp(0.0, ADC_MAX as f32);
    }

    /// Total rising edges seen on the step line while energized.
    pub fn pulses(&self) -> u64 {
        self.state.borrow().pulses
    }

    pub fn is_energized(&self) -> bool {
        self.state.borrow().energized
    }

    pub fn direction(&self) -> Direction {
        self.state.borrow().direction
    }

    /// Make every sensor read fail with a timeout.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }
}

/// Step/dir/enable lines of the simulated driver.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    state: Rc<RefCell<RigState>>,
}

impl StepDirPins for SimulatedDriver {
    fn set_enabled(
        &mut self,
        energized: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.borrow_mut().energized = energized;
        Ok(())
    }

    fn set_direction(
        &mut self,
        dir: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.borrow_mut().direction = dir;
        Ok(())
    }

    fn set_step(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.borrow_mut();
        let rising = high && !s.step_high;
        s.step_high = high;
        if rising && s.energized {
            s.pulses += 1;
            let delta = match s.direction {
                Direction::Increasing => s.params.counts_per_step,
                Direction::Decreasing => -s.params.counts_per_step,
            };
            // Hard end-stops of the spindle
            s.position = (s.position + delta).clamp(0.0, ADC_MAX as f32);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum SensorKind {
    Position,
    Pressure,
}

/// One analog channel of the simulated rig.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    state: Rc<RefCell<RigState>>,
    kind: SensorKind,
}

impl AnalogInput for SimulatedSensor {
    fn read(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.borrow_mut();
        if s.fail_reads {
            return Err(Box::new(HwError::Timeout));
        }
        let raw = match self.kind {
            SensorKind::Position => s.position.round().clamp(0.0, ADC_MAX as f32) as u16,
            SensorKind::Pressure => s.pressure_raw(),
        };
        tracing::trace!(raw, kind = ?self.kind, "sim adc sample");
        Ok(raw)
    }
}
