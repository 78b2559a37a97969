mod common;

use bpr_core::mocks::{ScriptedLink, SequenceInput};
use bpr_core::{Limits, Mode};
use bpr_hardware::MemStore;
use bpr_traits::clock::test_clock::TestClock;
use rstest::rstest;

use common::{build_device, unit_rig};

fn exchange(device: &mut bpr_core::Device, input: &str) -> String {
    let mut link = ScriptedLink::new(input);
    device.poll_protocol(&mut link).unwrap();
    assert_eq!(link.remaining(), 0);
    link.output()
}

#[test]
fn position_reads_back_and_ignores_writes() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);

    rig.set_position(150.0);
    assert_eq!(exchange(&mut dev, "S5=150R5"), "150\r\n");
    assert_eq!(exchange(&mut dev, "S5=999"), "");
    assert_eq!(exchange(&mut dev, "R5"), "150\r\n");
}

#[test]
fn unknown_variable_changes_nothing() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);
    let before = dev.persisted();

    assert_eq!(exchange(&mut dev, "S99=1"), "");
    assert_eq!(exchange(&mut dev, "R99R0S0=5"), "");
    assert_eq!(dev.persisted(), before);
    assert_eq!(dev.id(), "BPR");
    assert_eq!(rig.pulses(), 0);
}

#[rstest]
#[case("R1", "BPR\r\n")]
#[case("R2", "0\r\n")]
#[case("R3", "0.00\r\n")]
#[case("R4", "0.00\r\n")]
#[case("S2=1R2", "1\r\n")]
#[case("S3=4.5R3", "4.50\r\n")]
#[case("S1=lab-rig\r\nR1", "lab-rig\r\n")]
#[case("S1=\nR1", "\r\n")]
#[case("garbageR2", "0\r\n")]
fn read_write_exchanges(#[case] input: &str, #[case] expected: &str) {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);
    assert_eq!(exchange(&mut dev, input), expected);
}

#[test]
fn setpoint_write_forces_adjust() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);
    let setpoint = dev.setpoint();
    dev.controller_mut().output(setpoint);
    assert_eq!(dev.controller().mode(), Mode::Standby);

    exchange(&mut dev, "S3=2.75");
    assert_eq!(dev.setpoint(), 2.75);
    assert_eq!(dev.controller().mode(), Mode::Adjust);
}

#[test]
fn published_pressure_is_variable_four() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);
    dev.publish_pressure(2.5);
    assert_eq!(exchange(&mut dev, "R4"), "2.50\r\n");
}

#[test]
fn jog_moves_and_releases_driver() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);

    assert_eq!(exchange(&mut dev, "S10=-40R5"), "260\r\n");
    assert_eq!(rig.pulses(), 40);
    assert!(!rig.is_energized());
}

#[test]
fn jog_stops_at_captured_minimum() {
    let rig = unit_rig(250.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);

    exchange(&mut dev, "S8=");
    assert_eq!(dev.limits(), Limits::new(250, 1023));

    rig.set_position(300.0);
    exchange(&mut dev, "S10=-100");
    assert_eq!(rig.position(), 250.0);
    assert_eq!(rig.pulses(), 50);
    assert!(!rig.is_energized());
}

#[test]
fn enable_flag_does_not_touch_the_driver() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);
    exchange(&mut dev, "S2=1");
    assert!(dev.is_enabled());
    assert!(!rig.is_energized());
    exchange(&mut dev, "S2=0");
    assert!(!dev.is_enabled());
}

#[test]
fn commands_split_across_polls() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);

    let mut link = ScriptedLink::new("S3=1.5");
    dev.poll_protocol(&mut link).unwrap();
    link.push("R3");
    dev.poll_protocol(&mut link).unwrap();
    assert_eq!(link.take_output(), "1.50\r\n");
}

#[test]
fn text_value_cut_short_by_silence_is_kept() {
    let rig = unit_rig(300.0);
    let clock = TestClock::new();
    let mut dev = build_device(&rig, SequenceInput::fixed(200), MemStore::new(32), &clock, 10);

    let mut link = ScriptedLink::new("S1=lab");
    dev.poll_protocol(&mut link).unwrap();
    assert_eq!(dev.id(), "lab");

    // The tail of the interrupted value arrives later and is discarded as noise
    link.push("-7\nR1");
    dev.poll_protocol(&mut link).unwrap();
    assert_eq!(dev.id(), "lab");
    assert_eq!(link.take_output(), "lab\r\n");
}
