mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use bpr_core::mocks::{ScriptedLink, SequenceInput};
use bpr_core::{
    ControlLoop, Device, Limits, MotionFault, Output, PersistedState, SamplingCfg,
    SensorCalibration, StepperCfg,
};
use bpr_hardware::{MemStore, RigParams, SimulatedRig};
use bpr_traits::AnalogInput;
use bpr_traits::clock::test_clock::TestClock;

use common::{bpr_curve, unit_rig};

fn device(
    rig: &SimulatedRig,
    pressure: impl AnalogInput + 'static,
    clock: &TestClock,
    setpoint: f32,
    enabled: bool,
) -> Device {
    Device::builder()
        .with_driver(rig.driver())
        .with_position_sensor(rig.position_sensor())
        .with_pressure_sensor(pressure)
        .with_store(MemStore::new(32))
        .with_clock(clock.clone())
        .with_curve(bpr_curve())
        .with_stepper(StepperCfg::default())
        .with_fallback(PersistedState {
            setpoint,
            calibration: SensorCalibration::new(0.01, 0.0),
            limits: Limits::default(),
        })
        .with_start_enabled(enabled)
        .build()
        .unwrap()
}

#[test]
fn pressure_above_setpoint_backs_the_valve_off() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let dev = device(&rig, SequenceInput::fixed(550), &clock, 5.0, true);
    let mut ctl = ControlLoop::new(dev, ScriptedLink::default(), SamplingCfg::default());

    let report = ctl.cycle().unwrap();
    assert!((report.pressure - 5.5).abs() < 1e-4);
    assert_eq!(report.passes, 1);
    assert_eq!(
        report.output,
        Output {
            steps: -8,
            speed: 40.0
        }
    );
    let motion = report.motion.expect("moved");
    assert_eq!(motion.issued, 8);
    assert_eq!(motion.fault, MotionFault::None);
    assert_eq!(rig.position(), 292.0);
    assert!(!rig.is_energized());
    // 9 sample intervals + 8 pulses at 40 steps/s
    assert_eq!(clock.elapsed(), Duration::from_millis(180 + 200));
}

#[test]
fn disabled_device_idles() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let dev = device(&rig, SequenceInput::fixed(550), &clock, 5.0, false);
    let mut ctl = ControlLoop::new(dev, ScriptedLink::default(), SamplingCfg::default());

    let report = ctl.cycle().unwrap();
    assert_eq!(report.output.steps, -8);
    assert!(report.motion.is_none());
    assert_eq!(rig.pulses(), 0);
    assert_eq!(clock.elapsed(), Duration::from_millis(180 + 100));
}

#[test]
fn protocol_is_serviced_while_sampling() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let dev = device(&rig, SequenceInput::fixed(300), &clock, 3.0, false);
    let mut ctl = ControlLoop::new(dev, ScriptedLink::new("R3S3=4.0R3"), SamplingCfg::default());

    ctl.stabilization_pass().unwrap();
    assert_eq!(ctl.link().output(), "3.00\r\n4.00\r\n");
    assert_eq!(ctl.device().setpoint(), 4.0);
}

#[test]
fn noisy_readings_near_setpoint_take_extra_passes() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let sampling = SamplingCfg {
        samples_per_pass: 1,
        ..SamplingCfg::default()
    };
    // 3.00, 3.10, 3.20, 3.20 bar
    let dev = device(&rig, SequenceInput::new([300, 310, 320, 320]), &clock, 3.0, false);
    let mut ctl = ControlLoop::new(dev, ScriptedLink::default(), sampling);

    assert_eq!(ctl.stabilize().unwrap().1, 1);
    let (avg, passes) = ctl.stabilize().unwrap();
    assert_eq!(passes, 3);
    assert!((avg - 3.2).abs() < 1e-4);
}

#[test]
fn far_from_setpoint_skips_settling() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let sampling = SamplingCfg {
        samples_per_pass: 1,
        ..SamplingCfg::default()
    };
    let dev = device(&rig, SequenceInput::new([100, 150, 200]), &clock, 5.0, false);
    let mut ctl = ControlLoop::new(dev, ScriptedLink::default(), sampling);

    ctl.stabilize().unwrap();
    assert_eq!(ctl.stabilize().unwrap().1, 1);
}

#[test]
fn run_honours_cycle_budget_and_shutdown() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let dev = device(&rig, SequenceInput::fixed(300), &clock, 3.0, true);
    let flag = Arc::new(AtomicBool::new(false));
    let mut ctl = ControlLoop::new(dev, ScriptedLink::default(), SamplingCfg::default())
        .with_shutdown(flag.clone());

    assert_eq!(ctl.run(Some(3)).unwrap().cycles, 3);

    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    assert_eq!(ctl.run(None).unwrap().cycles, 0);
}

#[test]
fn closed_loop_settles_on_setpoint() {
    // 0.0025 bar per step with the 0.01 bar/count calibration below
    let rig = SimulatedRig::new(RigParams {
        start_position: 300.0,
        counts_per_step: 0.5,
        pressure_offset: 40.0,
        pressure_gain: 0.5,
        pressure_noise: 0.0,
    });
    let clock = TestClock::new();
    let dev = device(&rig, rig.pressure_sensor(), &clock, 3.0, true);
    let mut ctl = ControlLoop::new(dev, ScriptedLink::default(), SamplingCfg::default());

    let start = ctl.cycle().unwrap();
    assert!((start.pressure - 1.9).abs() < 1e-3);
    assert!(start.output.steps > 0);

    ctl.run(Some(400)).unwrap();
    let settled = ctl.cycle().unwrap().pressure;
    assert!((settled - 3.0).abs() < 0.05, "settled at {settled}");
    assert_eq!(ctl.device().pressure(), settled);
}
