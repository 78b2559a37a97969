#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<bpr_config::Config>(data) {
        if cfg.validate().is_ok() {
            // Every validated curve must derive without rejection
            let curve = bpr_core::CurveParams::from(&cfg.curve);
            assert!(bpr_core::ControlCurve::new(curve).is_ok());
        }
    }
});
