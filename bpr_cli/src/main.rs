mod app;
mod cli;
mod error_fmt;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `RUST_LOG` wins over the flag, the flag over `[logging] level`.
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Console logs always go to stderr: in simulation stdout carries the command link.
fn init_tracing(cli: &Cli, logging: &bpr_config::Logging) -> eyre::Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(logging.level.as_deref())
        .unwrap_or("info");

    let console: BoxedLayer = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter_for(level))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter_for(level))
            .boxed()
    };
    let mut layers = vec![console];

    if let Some(path) = logging.file.as_deref() {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter_for(level))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;

    let cfg = app::load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run { cycles } => app::run(&cfg, cycles, cli.json),
        Commands::SelfCheck => app::self_check(&cfg, cli.json),
        Commands::DumpStore => app::dump_store(&cfg),
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        tracing::debug!(error = ?e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
