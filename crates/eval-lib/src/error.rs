//! Error types for MTO evaluation runs.

use thiserror::Error;

/// Result type alias for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised by the driver, the poller and the telemetry exporter.
#[derive(Debug, Error)]
pub enum EvalError {
    // Orchestrator errors
    #[error("provisioning failed: {reason}")]
    Provisioning { reason: String },

    #[error("no NS descriptor named '{name}'")]
    DescriptorNotFound { name: String },

    #[error("NS instance {instance_id} unreachable: {reason}")]
    InstanceUnreachable { instance_id: String, reason: String },

    #[error("MEC application registration failed: {reason}")]
    Mec { reason: String },

    // Monitoring errors
    #[error("monitoring item {item_id} not found ({found} items returned)")]
    ItemNotFound { item_id: String, found: usize },

    #[error("no history for item {item_id} in [{time_from}, {time_till})")]
    EmptyHistory {
        item_id: String,
        time_from: i64,
        time_till: i64,
    },

    #[error("monitoring API error: {reason}")]
    Monitoring { reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn provisioning(reason: impl Into<String>) -> Self {
        Self::Provisioning {
            reason: reason.into(),
        }
    }

    pub fn monitoring(reason: impl Into<String>) -> Self {
        Self::Monitoring {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
