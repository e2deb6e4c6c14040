//! pmctx CLI
//!
//! Operator tool for the pmctx context engine: shows how per-agent token
//! budgets are derived and dry-runs compression over saved transcripts.
//!
//! Settings come from `pmctx.toml` (or `--config`), then `PMCTX_*`
//! environment overrides. `RUST_LOG` takes precedence over the configured
//! log level.

mod args;
mod commands;
mod console;

use anyhow::Context;
use clap::Parser;
use pmctx_core::settings::{self, LoggingConfig, PmctxSettings};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = settings::load_from_file(&cli.config)
        .with_context(|| format!("loading settings from '{}'", cli.config.display()))?;
    settings.apply_env_overrides()?;
    settings.validate()?;

    let mut logging = settings.logging.clone();
    logging.merge(LoggingConfig {
        level: if cli.verbose { "debug".to_string() } else { String::new() },
        format: cli.log_format.map(|f| f.as_str().to_string()).unwrap_or_default(),
    });
    init_logging(&logging);

    route(cli.command, settings).await
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}

async fn route(command: Commands, settings: PmctxSettings) -> anyhow::Result<()> {
    match command {
        Commands::Budget {
            window,
            history,
            agent,
            json,
        } => commands::budget::show(&settings, window, history, agent.as_deref(), json),
        Commands::Compress {
            input,
            agent,
            model,
            window,
            history,
            strategy,
            output,
            json,
        } => {
            let options = commands::compress::CompressOptions {
                input,
                agent,
                model,
                window,
                history,
                strategy,
                output,
                json,
            };
            commands::compress::run(&settings, options).await
        }
    }
}
