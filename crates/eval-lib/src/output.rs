//! Output formatting utilities shared by the binaries

use crate::driver::{MecOutcome, ScenarioReport};
use crate::monitoring::ExportReport;
use crate::poller::Retirement;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for run summaries
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled, Serialize)]
struct RetirementRow {
    #[tabled(rename = "NS INSTANCE")]
    instance_id: String,
    #[tabled(rename = "REASON")]
    reason: String,
    #[tabled(rename = "FETCHES")]
    attempts: u32,
    #[tabled(rename = "OPERATIONAL")]
    operational: String,
    #[tabled(rename = "CONFIG")]
    config: String,
}

impl From<&Retirement> for RetirementRow {
    fn from(r: &Retirement) -> Self {
        let (operational, config) = r
            .last_status
            .as_ref()
            .map(|s| (s.operational_status.clone(), s.config_status.clone()))
            .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
        Self {
            instance_id: r.instance_id.clone(),
            reason: color_status(r.reason.as_str()),
            attempts: r.attempts,
            operational,
            config,
        }
    }
}

#[derive(Tabled, Serialize)]
struct ExportRow {
    #[tabled(rename = "HOSTGROUP")]
    hostgroup: String,
    #[tabled(rename = "METRIC")]
    metric: String,
    #[tabled(rename = "ITEM")]
    item_id: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a retirement reason or step status
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "configured" | "registered" | "written" => status.green().to_string(),
        "terminating" | "exhausted" | "skipped" => status.yellow().to_string(),
        "failed" | "unreachable" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Print the outcome of one scenario
pub fn print_scenario_summary(report: &ScenarioReport, format: OutputFormat) {
    if let OutputFormat::Json = format {
        if let Ok(json) = serde_json::to_string_pretty(report) {
            println!("{}", json);
        }
        return;
    }

    print_info(&format!(
        "Scenario {} ({} requests): {} status fetches in {}m",
        report.run_id, report.requested, report.poll.fetches, report.elapsed_minutes
    ));
    let rows: Vec<RetirementRow> = report.poll.retirements.iter().map(Into::into).collect();
    print_table(&rows, format);

    match &report.mec {
        MecOutcome::Skipped => {}
        MecOutcome::Registered { .. } => print_success("MEC application registered"),
        MecOutcome::Failed { error } => {
            print_warning(&format!("MEC registration failed: {}", error))
        }
    }

    let teardown = &report.teardown;
    if teardown.failures.is_empty() {
        print_success(&format!(
            "Deleted {} NS instances and {} VIM accounts",
            teardown.deleted_ns_instances, teardown.deleted_vim_accounts
        ));
    } else {
        for failure in &teardown.failures {
            print_error(&format!(
                "Failed to delete {} {}: {}",
                failure.kind, failure.id, failure.error
            ));
        }
    }
}

/// Print the files written and the targets that failed
pub fn print_export_report(report: &ExportReport, format: OutputFormat) {
    if let OutputFormat::Json = format {
        if let Ok(json) = serde_json::to_string_pretty(report) {
            println!("{}", json);
        }
        return;
    }

    let written = report.written.iter().map(|f| ExportRow {
        hostgroup: f.target.hostgroup.clone(),
        metric: f.target.metric.clone(),
        item_id: f.target.item_id.clone(),
        result: format!("{} ({} rows)", f.path.display(), f.rows),
    });
    let failed = report.failed.iter().map(|f| ExportRow {
        hostgroup: f.target.hostgroup.clone(),
        metric: f.target.metric.clone(),
        item_id: f.target.item_id.clone(),
        result: f.error.red().to_string(),
    });
    let rows: Vec<ExportRow> = written.chain(failed).collect();
    print_table(&rows, format);
}
