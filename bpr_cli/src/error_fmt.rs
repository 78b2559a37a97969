//! Human-readable error descriptions and structured JSON error formatting.

use bpr_core::error::{BprError, BuildError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDriver => {
                "What happened: No stepper driver was provided to the device.\nLikely causes: GPIO pins failed to initialize or were not wired into the builder.\nHow to fix: Check [pins] step/dir/enable and that the driver is passed via with_driver(...).".to_string()
            }
            BuildError::MissingPositionSensor | BuildError::MissingPressureSensor => format!(
                "What happened: {be}.\nLikely causes: The ADC failed to initialize or a channel was not wired into the builder.\nHow to fix: Check [pins] adc_*_channel and the SPI bus."
            ),
            BuildError::MissingStore => {
                "What happened: No non-volatile store was provided.\nLikely causes: The storage image could not be opened.\nHow to fix: Check [storage] path and its permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<BprError>() {
        return match de {
            BprError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing [pins], a typo in a key, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
            ),
            BprError::Timeout => {
                "What happened: Sensor read timed out.\nLikely causes: MCP3008 not wired correctly, no power/ground, or wrong SPI bus.\nHow to fix: Verify the ADC wiring and the [pins] adc_*_channel values.".to_string()
            }
            BprError::HardwareFault(msg) => format!(
                "What happened: The valve did not respond ({msg}).\nLikely causes: Driver not energized, jammed spindle, or a disconnected position potentiometer.\nHow to fix: Check the driver supply and the mechanics, then rerun self-check."
            ),
            BprError::Storage(msg) => format!(
                "What happened: The persisted store could not be accessed ({msg}).\nLikely causes: Wrong [storage] path or missing permissions.\nHow to fix: Point [storage] path at a writable location."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error class; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<BprError>() {
        Some(BprError::Config(_)) => 2,
        Some(BprError::Timeout) => 3,
        Some(BprError::Hardware(_) | BprError::HardwareFault(_)) => 4,
        Some(BprError::Storage(_) | BprError::Io(_)) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<BprError>() {
        Some(BprError::Config(_)) => "Config",
        Some(BprError::Timeout) => "Timeout",
        Some(BprError::Hardware(_)) => "Hardware",
        Some(BprError::HardwareFault(_)) => "HardwareFault",
        Some(BprError::Storage(_)) => "Storage",
        Some(BprError::Io(_)) => "Io",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn context_does_not_hide_the_typed_error() {
        let err: eyre::Result<()> = Err(eyre::Report::new(BprError::Timeout));
        let err = err.wrap_err("self-check pressure read").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("Sensor read timed out"));
    }

    #[test]
    fn json_errors_carry_reason_and_code() {
        let err = eyre::Report::new(BprError::Config("curve.e_slow must be > curve.e_allowed".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Config");
        assert_eq!(v["exit_code"], 2);
        assert!(v["message"].as_str().unwrap().contains("e_slow"));
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("Original: boom"));
    }
}
