//! ds-mapper entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use ds_mapper::cli::Cli;
use ds_mapper::{Mapper, MappingConfig};

/// Clear the running flag on Ctrl-C / SIGTERM
fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

fn run(cli: &Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from {:?}", config_path);
    let config = MappingConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let running = setup_interrupt_handler();
    let mut mapper = Mapper::start(config, cli.auto, running).context("starting mapper")?;
    let result = mapper.run();
    mapper.shutdown();
    result.context("routing events")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(()) => {
            info!("Stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
