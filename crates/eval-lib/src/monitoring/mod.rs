//! Telemetry export from the monitoring backend
//!
//! This module provides:
//! - `MonitoringClient`, a JSON-RPC client for the monitoring API
//! - chunked history retrieval over bounded time windows
//! - CSV serialization of history records
//! - the exporter tying them together per configured metric target

mod client;
mod csv_writer;
mod exporter;
mod history;


pub use client::MonitoringClient;
pub use csv_writer::{format_clock, write_history_csv};
pub use exporter::{export_file_name, export_window, ExportFailure, ExportReport, ExportedFile};
pub use history::{fetch_history, HistoryWindow, SECONDS_PER_DAY};

use crate::error::Result;
use crate::models::{HistoryRecord, ItemInfo, ValueType};
use async_trait::async_trait;

/// Read access to item metadata and history
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Resolve item metadata; a known item yields exactly one entry
    async fn items(&self, item_id: &str) -> Result<Vec<ItemInfo>>;

    /// Samples with `time_from <= clock < time_till`, sorted by clock
    async fn history(
        &self,
        item_id: &str,
        value_type: ValueType,
        time_from: i64,
        time_till: i64,
    ) -> Result<Vec<HistoryRecord>>;
}
