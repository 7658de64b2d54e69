//! MTO telemetry exporter
//!
//! Exports the monitoring history of the configured metric targets over a
//! window ending now (or at `--till`) into one CSV file per target.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use eval_lib::config::{EvalConfig, MetricTarget};
use eval_lib::monitoring::{export_window, MonitoringClient};
use eval_lib::observability::EventLogger;
use eval_lib::output::{self, OutputFormat};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// MTO telemetry exporter
#[derive(Parser)]
#[command(name = "mto-export")]
#[command(author, version, about = "Export monitoring history to CSV", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/mto-eval/config.toml)
    #[arg(long, short, env = "MTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Length of the exported window in minutes
    #[arg(long, short, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    pub minutes: u64,

    /// End of the window as a Unix timestamp (defaults to now)
    #[arg(long)]
    pub till: Option<i64>,

    /// Directory receiving the CSV files
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Maximum days of history per request
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=30))]
    pub max_days: Option<u32>,

    /// Export only this item instead of the configured targets
    #[arg(long)]
    pub item_id: Option<String>,

    /// Host group used in the file name of --item-id
    #[arg(long, requires = "item_id")]
    pub hostgroup: Option<String>,

    /// Metric name used in the file name of --item-id
    #[arg(long, requires = "item_id")]
    pub metric: Option<String>,

    /// Monitoring API endpoint
    #[arg(long, env = "MTO_MONITORING_URL")]
    pub api_url: Option<String>,

    /// Monitoring API user
    #[arg(long, short, env = "MTO_MONITORING_USER")]
    pub user: Option<String>,

    /// Monitoring API password
    #[arg(long, env = "MTO_MONITORING_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Accept invalid TLS certificates from the monitoring API
    #[arg(long)]
    pub insecure: bool,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration
    fn apply(&self, config: &mut EvalConfig) {
        let monitoring = &mut config.monitoring;
        if let Some(url) = &self.api_url {
            monitoring.api_url = url.clone();
        }
        if let Some(user) = &self.user {
            monitoring.user = user.clone();
        }
        if let Some(password) = &self.password {
            monitoring.password = password.clone();
        }
        if let Some(max_days) = self.max_days {
            monitoring.max_days = max_days;
        }
        if self.insecure {
            monitoring.accept_invalid_certs = true;
        }
        if let Some(item_id) = &self.item_id {
            monitoring.targets = vec![MetricTarget {
                hostgroup: self.hostgroup.clone().unwrap_or_else(|| "custom".to_string()),
                metric: self.metric.clone().unwrap_or_else(|| item_id.clone()),
                item_id: item_id.clone(),
            }];
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config =
        EvalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    let targets = &config.monitoring.targets;
    if targets.is_empty() {
        bail!("No monitoring targets configured; pass --item-id or add [[monitoring.targets]]");
    }

    let time_till = cli.till.unwrap_or_else(|| Utc::now().timestamp());
    let time_from = time_till - cli.minutes as i64 * 60;
    info!(
        time_from = time_from,
        time_till = time_till,
        targets = targets.len(),
        "Exporting monitoring history"
    );

    let client = MonitoringClient::connect(&config.monitoring)
        .await
        .context("Failed to log in to the monitoring API")?;
    let logger = EventLogger::new(format!("export-{}", time_till));
    let report = export_window(
        &client,
        targets,
        time_from,
        time_till,
        config.monitoring.max_days,
        &config.output_dir,
        &logger,
    )
    .await
    .with_context(|| format!("Failed to export into {}", config.output_dir.display()))?;

    output::print_export_report(&report, cli.format);

    if report.written.is_empty() {
        bail!("No monitoring target could be exported");
    }
    if report.is_complete() {
        output::print_success(&format!(
            "Exported {} targets to {}",
            report.written.len(),
            config.output_dir.display()
        ));
    } else {
        output::print_warning(&format!(
            "{} of {} targets failed to export",
            report.failed.len(),
            targets.len()
        ));
    }

    Ok(())
}
