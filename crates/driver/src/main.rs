//! MTO evaluation driver
//!
//! Runs each configured scenario against the orchestrator, then exports the
//! monitoring history covering the scenario into `{output_dir}/{count}-request`.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use eval_lib::config::EvalConfig;
use eval_lib::driver::{ProvisioningDriver, ScenarioReport};
use eval_lib::mec::MecClient;
use eval_lib::monitoring::{export_window, MonitoringClient};
use eval_lib::observability::{EvalMetrics, EventLogger};
use eval_lib::orchestrator::OrchestratorClient;
use eval_lib::output::{self, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// MTO evaluation driver
#[derive(Parser)]
#[command(name = "mto-driver")]
#[command(author, version, about = "Provision NS instances, poll their lifecycle and export telemetry", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/mto-eval/config.toml)
    #[arg(long, short, env = "MTO_CONFIG")]
    config: Option<PathBuf>,

    /// Run these instance counts instead of the configured scenarios
    #[arg(long = "scenario", value_name = "COUNT")]
    scenarios: Vec<u32>,

    /// Output format for the run summaries
    #[arg(long, short, default_value = "table")]
    format: OutputFormat,

    /// Skip the telemetry export after each scenario
    #[arg(long)]
    skip_export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let mut config =
        EvalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if !cli.scenarios.is_empty() {
        config.scenarios = cli.scenarios.clone();
        config.validate()?;
    }
    info!(
        orchestrator = %config.orchestrator.base_url,
        scenarios = ?config.scenarios,
        ttl = config.poller.ttl,
        "Starting evaluation"
    );

    let orchestrator = Arc::new(
        OrchestratorClient::new(&config.orchestrator)
            .context("Failed to create orchestrator client")?,
    );

    // First Ctrl-C stops polling and later scenarios; teardown still runs.
    // A second one exits immediately.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if shutdown_tx.send_replace(true) {
                error!("Second interrupt received, exiting without teardown");
                std::process::exit(130);
            }
            warn!("Interrupt received, stopping after teardown");
        }
    });

    let mut driver = ProvisioningDriver::new(orchestrator, &config).with_shutdown(shutdown_rx);
    if config.mec.enabled {
        let mec = MecClient::new(&config.mec).context("Failed to create MEC client")?;
        driver = driver.with_mec(Arc::new(mec), config.mec.platform_id.clone());
    }

    let result = run_scenarios(&driver, &config, &cli).await;

    let metrics_path = config.output_dir.join("run-metrics.prom");
    if let Err(e) = EvalMetrics::new().write_to(&metrics_path) {
        warn!(path = %metrics_path.display(), error = %e, "Failed to write run metrics");
    }

    if let Err(e) = &result {
        error!(error = %e, "Evaluation failed");
        output::print_error(&format!("{:#}", e));
    }
    result
}

async fn run_scenarios(driver: &ProvisioningDriver, config: &EvalConfig, cli: &Cli) -> Result<()> {
    for &count in &config.scenarios {
        if driver.shutdown_requested() {
            bail!("Interrupted before scenario with {} instances", count);
        }
        let report = driver
            .run_scenario(count)
            .await
            .with_context(|| format!("Scenario with {} instances failed", count))?;
        output::print_scenario_summary(&report, cli.format);

        if cli.skip_export {
            continue;
        }
        export_scenario(config, &report, cli.format).await?;
    }
    Ok(())
}

/// Export the monitoring history of the minutes the scenario took
async fn export_scenario(
    config: &EvalConfig,
    report: &ScenarioReport,
    format: OutputFormat,
) -> Result<()> {
    let targets = &config.monitoring.targets;
    if targets.is_empty() {
        output::print_warning("No monitoring targets configured, skipping export");
        return Ok(());
    }

    let time_till = Utc::now().timestamp();
    let time_from = time_till - report.elapsed_minutes as i64 * 60;
    let dir = config.output_dir.join(format!("{}-request", report.requested));

    let client = MonitoringClient::connect(&config.monitoring)
        .await
        .context("Failed to log in to the monitoring API")?;
    let logger = EventLogger::new(report.run_id.clone());
    let export = export_window(
        &client,
        targets,
        time_from,
        time_till,
        config.monitoring.max_days,
        &dir,
        &logger,
    )
    .await
    .with_context(|| format!("Failed to export into {}", dir.display()))?;

    output::print_export_report(&export, format);
    if export.written.is_empty() {
        bail!("No monitoring target could be exported for scenario {}", report.run_id);
    }
    if !export.is_complete() {
        output::print_warning(&format!(
            "{} of {} targets failed to export",
            export.failed.len(),
            targets.len()
        ));
    }
    Ok(())
}
