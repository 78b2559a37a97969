#![allow(dead_code)]

use bpr_core::{CurveParams, Device, JogCfg, PersistedState, StepperCfg};
use bpr_hardware::{RigParams, SimulatedRig};
use bpr_traits::clock::test_clock::TestClock;
use bpr_traits::{AnalogInput, NonVolatile};

pub fn bpr_curve() -> CurveParams {
    CurveParams {
        e_allowed: 0.05,
        e_slow: 0.6,
        r_slow: 10.0,
        e_fast: 2.5,
        r_fast: 800.0,
        inverted: false,
    }
}

/// Rig whose spindle moves one count per step.
pub fn unit_rig(position: f32) -> SimulatedRig {
    SimulatedRig::new(RigParams {
        start_position: position,
        counts_per_step: 1.0,
        ..RigParams::default()
    })
}

pub fn build_device(
    rig: &SimulatedRig,
    pressure: impl AnalogInput + 'static,
    store: impl NonVolatile + 'static,
    clock: &TestClock,
    check_every: u32,
) -> Device {
    Device::builder()
        .with_driver(rig.driver())
        .with_position_sensor(rig.position_sensor())
        .with_pressure_sensor(pressure)
        .with_store(store)
        .with_clock(clock.clone())
        .with_curve(bpr_curve())
        .with_stepper(StepperCfg {
            check_every,
            ..StepperCfg::default()
        })
        .with_jog(JogCfg { speed_sps: 1000.0 })
        .with_fallback(PersistedState::default())
        .build()
        .expect("device builds")
}
