//! Convergence Tracker v0.3 - Main CLI Entry Point

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use convergence_tracker::{
    bootstrap,
    cli::{Args, Commands},
    config::TrackerConfig,
    execution::{self, Tracker},
    health::HealthScanner,
    telemetry::init_logging,
    tools::SystemRunner,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TrackerConfig::load(args.config.as_deref())?;
    config
        .apply_process_env()
        .context("Invalid environment configuration")?;
    args.apply_to(&mut config);

    let verbosity = args.verbosity();
    init_logging(config.logging.format, verbosity.level_filter())?;
    tracing::debug!(
        verbosity = verbosity.as_str(),
        format = %config.logging.format,
        "logging initialized"
    );

    match args.command() {
        Commands::Track => {
            run_tracker(&config, args.no_idle).await?;
        }
        Commands::Probe => {
            run_probe(&config).await?;
        }
        Commands::Health { since } => {
            run_health(&config, since).await;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

async fn run_tracker(config: &TrackerConfig, no_idle: bool) -> Result<()> {
    let runner = Arc::new(SystemRunner::new(config.command_context()));
    let reporter = execution::build_reporter(config)?;

    let tracker = Tracker::new(config.clone(), runner, reporter)?;
    let summary = tracker.run().await.context("Tracker run failed")?;

    tracing::debug!(
        uuid = %summary.identity.uuid,
        ticks = summary.detection.ticks,
        info_indexed = summary.info_indexed,
        result_indexed = summary.result_indexed,
        stats = ?summary.stats,
        "run complete"
    );

    if !no_idle {
        execution::idle_until_shutdown().await?;
    }

    Ok(())
}

async fn run_probe(config: &TrackerConfig) -> Result<()> {
    let runner = Arc::new(SystemRunner::new(config.command_context()));
    let readings = execution::probe(runner, &config.run.node_name).await;

    println!("{}", serde_json::to_string_pretty(&readings)?);
    Ok(())
}

async fn run_health(config: &TrackerConfig, since: Option<DateTime<Utc>>) {
    let interconnect = bootstrap::is_interconnect(&config.run_dirs().ic_rundir).await;
    let since = since.unwrap_or(DateTime::<Utc>::MIN_UTC);

    let findings = HealthScanner::new(config.log_locations(), interconnect, since)
        .scan()
        .await;

    if findings.is_empty() {
        println!("{}: no problems", config.run.node_name);
    } else {
        for finding in &findings {
            println!("{}", finding);
        }
    }
}

fn show_config(config: &TrackerConfig) -> Result<()> {
    match TrackerConfig::config_path() {
        Ok(path) => println!("# Config file: {}", path.display()),
        Err(_) => println!("# Config file: (no home directory)"),
    }
    println!("{}", config.redacted().to_toml()?);
    Ok(())
}
