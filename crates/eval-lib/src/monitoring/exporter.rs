//! Per-target export of a history window to CSV files

use super::csv_writer::write_history_csv;
use super::history::{fetch_history, HistoryWindow};
use super::HistoryBackend;
use crate::config::MetricTarget;
use crate::error::{EvalError, Result};
use crate::observability::{EvalMetrics, EventLogger};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// A CSV file written for one target
#[derive(Debug, Clone, Serialize)]
pub struct ExportedFile {
    pub target: MetricTarget,
    pub path: PathBuf,
    pub rows: usize,
}

/// A target whose export failed
#[derive(Debug, Clone, Serialize)]
pub struct ExportFailure {
    pub target: MetricTarget,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub written: Vec<ExportedFile>,
    pub failed: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `{YYYY-MM-DD__HH-MM-SS}-{hostgroup}-{metric}.csv`
pub fn export_file_name(timestamp: DateTime<Utc>, hostgroup: &str, metric: &str) -> String {
    format!(
        "{}-{}-{}.csv",
        timestamp.format("%Y-%m-%d__%H-%M-%S"),
        hostgroup,
        metric
    )
}

/// Fetch and write one target; `created` is set once the file exists
async fn export_target<B>(
    backend: &B,
    target: &MetricTarget,
    window: HistoryWindow,
    path: &Path,
    created: &mut bool,
) -> Result<usize>
where
    B: HistoryBackend + ?Sized,
{
    let (time_from, time_till) = (window.time_from, window.time_till);
    let records = fetch_history(backend, &target.item_id, window).await?;
    if records.is_empty() {
        return Err(EvalError::EmptyHistory {
            item_id: target.item_id.clone(),
            time_from,
            time_till,
        });
    }

    // Never replace a file another target of this export wrote
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    *created = true;
    write_history_csv(&records, BufWriter::new(file))
}

/// Export `[time_from, time_till)` of every target into `dir`
///
/// Targets are independent: a failing target is recorded in the report and
/// the remaining ones are still exported. Only a failure to prepare `dir`
/// aborts the whole export.
pub async fn export_window<B>(
    backend: &B,
    targets: &[MetricTarget],
    time_from: i64,
    time_till: i64,
    max_days: u32,
    dir: &Path,
    logger: &EventLogger,
) -> Result<ExportReport>
where
    B: HistoryBackend + ?Sized,
{
    fs::create_dir_all(dir)?;
    let metrics = EvalMetrics::new();
    let stamp = Utc::now();
    let mut report = ExportReport::default();

    for target in targets {
        let path = dir.join(export_file_name(stamp, &target.hostgroup, &target.metric));
        let window = HistoryWindow::with_max_days(time_from, time_till, max_days);

        let mut created = false;
        match export_target(backend, target, window, &path, &mut created).await {
            Ok(rows) => {
                logger.log_export_written(&target.hostgroup, &target.metric, &path, rows);
                report.written.push(ExportedFile {
                    target: target.clone(),
                    path,
                    rows,
                });
            }
            Err(e) => {
                let error = e.to_string();
                logger.log_export_failed(&target.hostgroup, &target.metric, &error);
                metrics.inc_export_failures();
                // Don't leave a truncated file behind
                if created {
                    let _ = fs::remove_file(&path);
                }
                report.failed.push(ExportFailure {
                    target: target.clone(),
                    error,
                });
            }
        }
    }

    Ok(report)
}
