//! Observability infrastructure for evaluation runs
//!
//! Provides:
//! - Prometheus metrics (status fetch latency, retirements, teardown failures, history fetches)
//! - Structured logging of run events with tracing

use crate::models::{NsStatus, RetireReason};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for orchestrator round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EvalMetricsInner> = OnceLock::new();

struct EvalMetricsInner {
    status_fetch_latency_seconds: Histogram,
    ns_retired: IntCounterVec,
    teardown_failures: IntCounter,
    history_chunks: IntCounter,
    history_records: IntCounter,
    export_failures: IntCounter,
}

impl EvalMetricsInner {
    fn new() -> Self {
        Self {
            status_fetch_latency_seconds: register_histogram!(
                "mto_eval_status_fetch_latency_seconds",
                "Time spent fetching one NS instance status",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register status_fetch_latency_seconds"),

            ns_retired: register_int_counter_vec!(
                "mto_eval_ns_retired_total",
                "NS instances retired from the poller, by reason",
                &["reason"]
            )
            .expect("Failed to register ns_retired_total"),

            teardown_failures: register_int_counter!(
                "mto_eval_teardown_failures_total",
                "Delete calls that failed during teardown"
            )
            .expect("Failed to register teardown_failures_total"),

            history_chunks: register_int_counter!(
                "mto_eval_history_chunks_total",
                "history.get calls issued by the exporter"
            )
            .expect("Failed to register history_chunks_total"),

            history_records: register_int_counter!(
                "mto_eval_history_records_total",
                "History samples received by the exporter"
            )
            .expect("Failed to register history_records_total"),

            export_failures: register_int_counter!(
                "mto_eval_export_failures_total",
                "Metric exports that failed"
            )
            .expect("Failed to register export_failures_total"),
        }
    }
}

/// Handle to the process-wide evaluation metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct EvalMetrics {
    _private: (),
}

impl Default for EvalMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalMetrics {
    /// Create a metrics handle (registers the metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EvalMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EvalMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_status_fetch_latency(&self, duration_secs: f64) {
        self.inner().status_fetch_latency_seconds.observe(duration_secs);
    }

    pub fn inc_retired(&self, reason: RetireReason) {
        self.inner()
            .ns_retired
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub fn inc_teardown_failures(&self) {
        self.inner().teardown_failures.inc();
    }

    /// Record one history chunk and the samples it carried
    pub fn observe_history_chunk(&self, records: usize) {
        self.inner().history_chunks.inc();
        self.inner().history_records.inc_by(records as u64);
    }

    pub fn inc_export_failures(&self) {
        self.inner().export_failures.inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Write the text exposition to `path` (textfile-collector format)
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())
    }
}

/// Structured logger for evaluation events
///
/// Every event carries the run identifier so that interleaved runs can be
/// told apart in aggregated logs.
#[derive(Clone, Debug)]
pub struct EventLogger {
    run_id: String,
}

impl EventLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, instances: u32, ttl: u32) {
        info!(
            event = "scenario_started",
            run_id = %self.run_id,
            instances = instances,
            ttl = ttl,
            "Evaluation scenario started"
        );
    }

    pub fn log_vim_account_created(&self, name: &str, account_id: &str) {
        info!(
            event = "vim_account_created",
            run_id = %self.run_id,
            name = %name,
            account_id = %account_id,
            "VIM account created"
        );
    }

    pub fn log_ns_instantiated(&self, nsd_id: &str, instance_id: &str, account_id: &str) {
        info!(
            event = "ns_instantiated",
            run_id = %self.run_id,
            nsd_id = %nsd_id,
            instance_id = %instance_id,
            account_id = %account_id,
            "NS instance created"
        );
    }

    pub fn log_ns_status(&self, instance_id: &str, status: &NsStatus, remaining: u32) {
        info!(
            event = "ns_status",
            run_id = %self.run_id,
            instance_id = %instance_id,
            operational_status = %status.operational_status,
            config_status = %status.config_status,
            remaining = remaining,
            "NS status polled"
        );
    }

    pub fn log_ns_retired(&self, instance_id: &str, reason: RetireReason, attempts: u32) {
        match reason {
            RetireReason::Configured | RetireReason::Terminating => {
                info!(
                    event = "ns_retired",
                    run_id = %self.run_id,
                    instance_id = %instance_id,
                    reason = %reason,
                    attempts = attempts,
                    "NS instance reached terminal status"
                );
            }
            _ => {
                warn!(
                    event = "ns_retired",
                    run_id = %self.run_id,
                    instance_id = %instance_id,
                    reason = %reason,
                    attempts = attempts,
                    "NS instance retired without being configured"
                );
            }
        }
    }

    pub fn log_mec_registration(&self, platform_id: &str, app_d_id: &str, error: Option<&str>) {
        match error {
            None => info!(
                event = "mec_app_registered",
                run_id = %self.run_id,
                platform_id = %platform_id,
                app_d_id = %app_d_id,
                "AppD registered in MEC platform"
            ),
            Some(error) => warn!(
                event = "mec_app_registration_failed",
                run_id = %self.run_id,
                platform_id = %platform_id,
                app_d_id = %app_d_id,
                error = %error,
                "AppD registration failed"
            ),
        }
    }

    /// Log a deleted resource; `kind` is `ns_instance` or `vim_account`
    pub fn log_deleted(&self, kind: &str, id: &str) {
        info!(
            event = "resource_deleted",
            run_id = %self.run_id,
            kind = %kind,
            id = %id,
            "Resource deleted"
        );
    }

    pub fn log_teardown_failed(&self, kind: &str, id: &str, error: &str) {
        warn!(
            event = "teardown_failed",
            run_id = %self.run_id,
            kind = %kind,
            id = %id,
            error = %error,
            "Teardown step failed, continuing"
        );
    }

    pub fn log_export_written(&self, hostgroup: &str, metric: &str, path: &Path, rows: usize) {
        info!(
            event = "export_written",
            run_id = %self.run_id,
            hostgroup = %hostgroup,
            metric = %metric,
            path = %path.display(),
            rows = rows,
            "History exported"
        );
    }

    pub fn log_export_failed(&self, hostgroup: &str, metric: &str, error: &str) {
        warn!(
            event = "export_failed",
            run_id = %self.run_id,
            hostgroup = %hostgroup,
            metric = %metric,
            error = %error,
            "History export failed"
        );
    }

    pub fn log_run_finished(&self, elapsed_minutes: u64, teardown_failures: usize) {
        info!(
            event = "scenario_finished",
            run_id = %self.run_id,
            elapsed_minutes = elapsed_minutes,
            teardown_failures = teardown_failures,
            "Evaluation scenario finished"
        );
    }
}
