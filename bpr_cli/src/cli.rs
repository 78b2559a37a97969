//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "bpr", version, about = "Backpressure regulator")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/bpr_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print reports as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Regulate: sample, stabilize, actuate and serve the command link
    Run {
        /// Stop after this many control cycles (default: until Ctrl-C)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
    },
    /// Read both sensors and drive the valve to the middle of its soft limits
    SelfCheck,
    /// Print the persisted setpoint, calibration and limits as JSON
    DumpStore,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_takes_optional_cycle_budget() {
        let cli = Cli::try_parse_from(["bpr", "--json", "run", "--cycles", "3"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.cmd, Commands::Run { cycles: Some(3) }));
        assert!(cli.log_level.is_none());
    }
}
