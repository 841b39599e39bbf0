use clap::Parser;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use filemon::{
    cli::{Cli, OutputFormat},
    MonitorConfig, MonitorEngine, RefreshOutcome, ScanResult,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let config_path = cli.get_config_path();
    let mut config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.apply_env_overrides();

    let engine = MonitorEngine::with_config(config).context("Invalid configuration")?;
    tracing::info!("Starting filemon with {}", config_path.display());

    if cli.once {
        handle_outcome(engine.refresh(), &cli)?;
        return Ok(());
    }

    run_polling_loop(&engine, &cli)
}

fn run_polling_loop(engine: &MonitorEngine, cli: &Cli) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let heartbeat = Duration::from_millis(cli.poll_interval);
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        handle_outcome(engine.refresh(), cli)?;

        // Sleep in short slices so Ctrl+C is honoured promptly
        while running.load(Ordering::SeqCst) && started.elapsed() < heartbeat {
            std::thread::sleep(Duration::from_millis(100).min(heartbeat));
        }
    }

    tracing::info!("Stopping filemon");
    Ok(())
}

fn handle_outcome(outcome: RefreshOutcome, cli: &Cli) -> Result<()> {
    match outcome {
        RefreshOutcome::Completed(result) => print_result(&result, cli)?,
        RefreshOutcome::NotReady => anyhow::bail!("Engine has no configuration"),
        RefreshOutcome::NotDue | RefreshOutcome::OutsideTimeWindow => {}
    }
    Ok(())
}

fn print_result(result: &ScanResult, cli: &Cli) -> Result<()> {
    match cli.output {
        OutputFormat::Text => print!("{}", result.render()),
        OutputFormat::Json => println!("{}", serde_json::to_string(result)?),
    }
    Ok(())
}
