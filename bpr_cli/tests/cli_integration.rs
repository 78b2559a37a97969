use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::tempdir;

// Sim backend: one potentiometer count per step and a position check after
// every pulse so self-check lands exactly on the limits' middle.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let store = dir.path().join("bpr.nvm");
    let toml = format!(
        r#"
[pins]
# pins are unused in sim backend but must be present
step = 13
dir = 19
enable = 26

[stepper]
check_every = 1

[sampling]
samples_per_pass = 2
sample_interval_ms = 5
idle_ms = 5

[storage]
path = '{}'

[sim]
start_position = 300.0
counts_per_step = 1.0
"#,
        store.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn bpr(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bpr_cli").unwrap();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(cfg).env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
#[case(&["self-check"], 0, "300 -> 511", "stdout")]
#[case(&["dump-store"], 0, "\"setpoint\"", "stdout")]
#[case(&["run", "--cycles"], 2, "value is required", "stderr")]
#[case(&["calibrate"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = bpr(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn erased_store_dumps_configured_fallbacks() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = bpr(&cfg).arg("dump-store").output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["setpoint"], 0.0);
    assert_eq!(v["limits"]["min"], 0);
    assert_eq!(v["limits"]["max"], 1023);
    let m = v["calibration"]["m"].as_f64().unwrap();
    assert!((m - 0.0489).abs() < 1e-6);
}

#[test]
fn run_serves_the_command_link_and_persists_the_setpoint() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    bpr(&cfg)
        .args(["run", "--cycles", "20"])
        .write_stdin("R1S3=2.5\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("BPR\r\n"))
        .stderr(predicate::str::contains("command link closed"));

    let out = bpr(&cfg).arg("dump-store").output().unwrap();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["setpoint"], 2.5);
}

#[test]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        "[pins]\nstep = 13\ndir = 19\nenable = 26\n[curve]\ne_allowed = 1.0\ne_slow = 0.5\n",
    )
    .unwrap();

    bpr(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("What happened: Invalid configuration"))
        .stderr(predicate::str::contains("e_slow"));
}

#[test]
fn missing_config_file_fails_cleanly() {
    let dir = tempdir().unwrap();
    bpr(&dir.path().join("absent.toml"))
        .arg("dump-store")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn sensor_timeout_maps_to_exit_code_and_json() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = bpr(&cfg)
        .env("BPR_TEST_SIM_ADC_FAIL", "1")
        .args(["--json", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Timeout");
    assert_eq!(v["exit_code"], 3);
}

#[test]
fn self_check_json_reports_positions() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = bpr(&cfg).args(["--json", "self-check"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["position_start"], 300);
    assert_eq!(v["position_reached"], 511);
    // 40 + 0.5 * 300 raw counts on the simulated transducer
    assert_eq!(v["pressure_raw"], 190);
}
