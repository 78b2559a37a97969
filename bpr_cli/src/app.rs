//! Config loading, backend assembly and the three subcommands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bpr_core::error::{BprError, Result};
use bpr_core::store::RECORD_LEN;
use bpr_core::{ControlLoop, Device, JogCfg, LinkCfg, PersistedState, SamplingCfg, StepperCfg, Store};
use bpr_hardware::FileStore;
use bpr_traits::SerialLink;
use eyre::WrapErr;
use serde_json::json;

/// Set (to anything) to make every simulated sensor read time out.
pub const SIM_ADC_FAIL_ENV: &str = "BPR_TEST_SIM_ADC_FAIL";

pub fn load_config(path: &Path) -> Result<bpr_config::Config> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eyre::Report::new(BprError::Config(format!("cannot read {}: {e}", path.display())))
    })?;
    let cfg: bpr_config::Config = toml::from_str(&text)
        .map_err(|e| eyre::Report::new(BprError::Config(e.message().to_string())))?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(BprError::Config(e.to_string())))?;
    Ok(cfg)
}

fn open_store(cfg: &bpr_config::Config) -> Result<FileStore> {
    let path = Path::new(&cfg.storage.path);
    FileStore::open(path, RECORD_LEN).map_err(|e| {
        eyre::Report::new(BprError::Storage(format!("{}: {e}", path.display())))
    })
}

/// Builder pre-loaded with everything the config decides.
fn configured_builder(cfg: &bpr_config::Config) -> Result<bpr_core::DeviceBuilder> {
    Ok(Device::builder()
        .with_store(open_store(cfg)?)
        .with_curve((&cfg.curve).into())
        .with_stepper(StepperCfg::from(&cfg.stepper))
        .with_jog(JogCfg::from(&cfg.jog))
        .with_link(LinkCfg::from(&cfg.serial))
        .with_fallback(PersistedState::from(&cfg.defaults))
        .with_id(cfg.device.id.clone())
        .with_start_enabled(cfg.device.start_enabled))
}

#[cfg(not(feature = "hardware"))]
pub fn build_device(cfg: &bpr_config::Config) -> Result<Device> {
    use bpr_hardware::{RigParams, SimulatedRig};

    let rig = SimulatedRig::new(RigParams {
        start_position: cfg.sim.start_position,
        counts_per_step: cfg.sim.counts_per_step,
        pressure_offset: cfg.sim.pressure_offset,
        pressure_gain: cfg.sim.pressure_gain,
        pressure_noise: cfg.sim.pressure_noise,
    });
    if std::env::var_os(SIM_ADC_FAIL_ENV).is_some() {
        rig.set_fail_reads(true);
    }
    tracing::info!(start_position = cfg.sim.start_position, "using simulated rig");
    configured_builder(cfg)?
        .with_driver(rig.driver())
        .with_position_sensor(rig.position_sensor())
        .with_pressure_sensor(rig.pressure_sensor())
        .build()
}

#[cfg(feature = "hardware")]
pub fn build_device(cfg: &bpr_config::Config) -> Result<Device> {
    use bpr_hardware::{GpioStepDir, Mcp3008};

    let hw = |e: bpr_hardware::error::HwError| eyre::Report::new(BprError::Hardware(e.to_string()));
    let driver = GpioStepDir::new(cfg.pins.step, cfg.pins.dir, cfg.pins.enable)
        .map_err(hw)
        .wrap_err("open stepper driver pins")?;
    let adc = Mcp3008::new().map_err(hw).wrap_err("open MCP3008")?;
    let pressure = adc.channel(cfg.pins.adc_pressure_channel).map_err(hw)?;
    let position = adc.channel(cfg.pins.adc_position_channel).map_err(hw)?;
    configured_builder(cfg)?
        .with_driver(driver)
        .with_position_sensor(position)
        .with_pressure_sensor(pressure)
        .build()
}

/// The command link: the configured UART on hardware builds, stdin/stdout otherwise.
pub fn open_link(cfg: &bpr_config::Config) -> Result<Box<dyn SerialLink>> {
    #[cfg(feature = "hardware")]
    {
        if let Some(path) = cfg.pins.uart.as_deref() {
            let uart = bpr_hardware::UartLink::open(path, cfg.serial.baud)
                .map_err(|e| eyre::Report::new(BprError::Hardware(e.to_string())))
                .wrap_err("open command UART")?;
            return Ok(Box::new(uart));
        }
    }
    tracing::info!(baud = cfg.serial.baud, "command link on stdin/stdout");
    Ok(Box::new(bpr_hardware::StdioLink::spawn()))
}

pub fn run(cfg: &bpr_config::Config, cycles: Option<u64>, json: bool) -> Result<()> {
    let device = build_device(cfg)?;
    let link = open_link(cfg)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })
    .wrap_err("install Ctrl-C handler")?;

    let mut ctl = ControlLoop::new(device, link, SamplingCfg::from(&cfg.sampling))
        .with_shutdown(shutdown);
    let summary = ctl.run(cycles)?;

    // stdout belongs to the command link in simulation; the summary goes to stderr
    if json {
        eprintln!(
            "{}",
            json!({
                "cycles": summary.cycles,
                "moves": summary.moves,
                "faults": summary.faults,
                "pressure_bar": ctl.device().pressure(),
            })
        );
    }
    Ok(())
}

pub fn self_check(cfg: &bpr_config::Config, json: bool) -> Result<()> {
    let mut device = build_device(cfg)?;

    let raw = device.read_pressure_raw().wrap_err("self-check pressure read")?;
    let pressure = device.calibration().to_physical(raw);
    let start = device.position().wrap_err("self-check position read")?;
    let target = device.limits().middle();

    let servo = device.servo_mut();
    servo.set_speed(cfg.jog.speed_sps);
    servo.set_enabled(true)?;
    let reached = servo.move_to(target);
    servo.set_enabled(false)?;
    let reached = reached.wrap_err("self-check move")?;
    tracing::info!(start, target, reached, "self-check move complete");

    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "pressure_raw": raw,
                "pressure_bar": pressure,
                "position_start": start,
                "position_target": target,
                "position_reached": reached,
            })
        );
    } else {
        println!("pressure: {pressure:.2} bar (raw {raw})");
        println!("position: {start} -> {reached} (target {target})");
        println!("self-check OK");
    }
    Ok(())
}

pub fn dump_store(cfg: &bpr_config::Config) -> Result<()> {
    let mut store = Store::new(open_store(cfg)?);
    let state = store.load(&PersistedState::from(&cfg.defaults))?;
    println!(
        "{}",
        json!({
            "path": cfg.storage.path,
            "setpoint": state.setpoint,
            "calibration": { "m": state.calibration.m, "q": state.calibration.q },
            "limits": { "min": state.limits.min(), "max": state.limits.max() },
        })
    );
    Ok(())
}
