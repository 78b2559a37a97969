mod common;

use bpr_core::mocks::{ScriptedLink, SequenceInput};
use bpr_core::store::{CAL_M_OFFSET, POS_MAX_OFFSET, POS_MIN_OFFSET, RECORD_LEN};
use bpr_core::{
    CalibrationPoint, Limits, PersistedState, SensorCalibration, Store,
};
use bpr_hardware::FileStore;
use bpr_traits::NonVolatile;
use bpr_traits::clock::test_clock::TestClock;
use tempfile::tempdir;

use common::{build_device, unit_rig};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn two_point_solution() {
    let cal = SensorCalibration::from_points(
        CalibrationPoint { raw: 100, value: 1.0 },
        CalibrationPoint { raw: 300, value: 3.0 },
    )
    .unwrap();
    assert!(approx(cal.m, 0.01));
    assert!(approx(cal.q, 0.0));
    assert!(approx(cal.to_physical(200), 2.0));
}

#[test]
fn calibration_commands_update_and_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bpr.nvm");
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let store = FileStore::open(&path, RECORD_LEN).unwrap();
    let mut dev = build_device(&rig, SequenceInput::new([100, 300]), store, &clock, 10);

    let mut link = ScriptedLink::new("S6=1.0S7=3.0");
    dev.poll_protocol(&mut link).unwrap();
    assert_eq!(link.output(), "");
    let cal = dev.calibration();
    assert!(approx(cal.m, 0.01) && approx(cal.q, 0.0), "{cal:?}");
    drop(dev);

    let mut reopened = Store::new(FileStore::open(&path, RECORD_LEN).unwrap());
    let state = reopened.load(&PersistedState::default()).unwrap();
    assert!(approx(state.calibration.m, 0.01));
    assert!(approx(state.calibration.q, 0.0));
}

#[test]
fn calibration_end_without_begin_is_ignored() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let store = bpr_hardware::MemStore::new(RECORD_LEN);
    let mut dev = build_device(&rig, SequenceInput::new([100, 300]), store, &clock, 10);
    let before = dev.calibration();
    dev.poll_protocol(&mut ScriptedLink::new("S7=3.0")).unwrap();
    assert_eq!(dev.calibration(), before);
}

#[test]
fn degenerate_calibration_is_ignored() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let store = bpr_hardware::MemStore::new(RECORD_LEN);
    let mut dev = build_device(&rig, SequenceInput::fixed(512), store, &clock, 10);
    let before = dev.calibration();
    dev.poll_protocol(&mut ScriptedLink::new("S6=1.0S7=3.0")).unwrap();
    assert_eq!(dev.calibration(), before);
}

#[test]
fn first_point_is_retained_until_replaced() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let store = bpr_hardware::MemStore::new(RECORD_LEN);
    let mut dev = build_device(&rig, SequenceInput::new([100, 300, 500]), store, &clock, 10);

    dev.poll_protocol(&mut ScriptedLink::new("S6=1.0S7=3.0")).unwrap();
    // second end reuses (100, 1.0)
    dev.poll_protocol(&mut ScriptedLink::new("S7=5.0")).unwrap();
    assert!(approx(dev.calibration().m, 0.01));
    assert!(approx(dev.calibration().to_physical(500), 5.0));
}

#[test]
fn setpoint_and_limits_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bpr.nvm");
    let clock = TestClock::new();
    {
        let rig = unit_rig(120.0);
        let store = FileStore::open(&path, RECORD_LEN).unwrap();
        let mut dev = build_device(&rig, SequenceInput::fixed(200), store, &clock, 10);
        let mut link = ScriptedLink::new("S3=3.25S8=");
        dev.poll_protocol(&mut link).unwrap();
        rig.set_position(880.0);
        link.push("S9=");
        dev.poll_protocol(&mut link).unwrap();
    }

    let rig = unit_rig(500.0);
    let store = FileStore::open(&path, RECORD_LEN).unwrap();
    let dev = build_device(&rig, SequenceInput::fixed(200), store, &clock, 10);
    assert_eq!(dev.setpoint(), 3.25);
    assert_eq!(dev.limits(), Limits::new(120, 880));

    let mut raw = FileStore::open(&path, RECORD_LEN).unwrap();
    let mut word = [0u8; 4];
    raw.read(POS_MAX_OFFSET, &mut word).unwrap();
    assert_eq!(i32::from_le_bytes(word), 880);
    raw.read(POS_MIN_OFFSET, &mut word).unwrap();
    assert_eq!(i32::from_le_bytes(word), 120);
}

#[test]
fn implausible_fields_fall_back_individually() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bpr.nvm");
    {
        let mut raw = FileStore::open(&path, RECORD_LEN).unwrap();
        raw.write(0, &1.5f32.to_le_bytes()).unwrap();
        // m = 0 is not a usable calibration
        raw.write(CAL_M_OFFSET, &0.0f32.to_le_bytes()).unwrap();
        raw.write(POS_MAX_OFFSET, &5000i32.to_le_bytes()).unwrap();
        raw.write(POS_MIN_OFFSET, &10i32.to_le_bytes()).unwrap();
    }
    let fallback = PersistedState {
        setpoint: 9.0,
        calibration: SensorCalibration::new(0.02, -1.0),
        limits: Limits::new(50, 950),
    };
    let mut store = Store::new(FileStore::open(&path, RECORD_LEN).unwrap());
    let state = store.load(&fallback).unwrap();
    assert_eq!(state.setpoint, 1.5);
    assert_eq!(state.calibration, fallback.calibration);
    assert_eq!(state.limits, fallback.limits);
}
