//! Evaluation configuration
//!
//! Values come from serde defaults, an optional TOML file and `MTO__*`
//! environment variables, in increasing order of precedence.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration shared by the driver and the exporter
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub vim: VimConfig,

    /// Name of the NS descriptor every instance is created from
    #[serde(default = "default_target_nsd_name")]
    pub target_nsd_name: String,

    #[serde(default)]
    pub poller: PollerConfig,

    /// Instance counts; each entry is one full evaluation scenario
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<u32>,

    #[serde(default)]
    pub mec: MecConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Root directory for CSV artifacts and the metrics dump
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Orchestrator REST endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_orchestrator_url")]
    pub base_url: String,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Skip TLS certificate verification (test beds with self-signed certs)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Template for the VIM accounts created during a run
#[derive(Debug, Clone, Deserialize)]
pub struct VimConfig {
    #[serde(default)]
    pub tenant: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_vim_type")]
    pub vim_type: String,

    #[serde(default = "default_description")]
    pub description: String,

    /// Extra VIM configuration forwarded verbatim
    #[serde(default)]
    pub config: Option<Value>,
}

/// What the poller does when a status fetch fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreachablePolicy {
    /// Count the failed fetch against the instance's budget
    #[default]
    Retry,
    /// Stop polling and fail the scenario
    Abort,
}

/// NS lifecycle poller settings
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Status fetches allowed per instance
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Pause between consecutive fetches (0 polls back to back)
    #[serde(default)]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub on_unreachable: UnreachablePolicy,
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// MEC platform endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MecConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_mec_url")]
    pub base_url: String,

    #[serde(default = "default_platform_id")]
    pub platform_id: String,
}

/// Monitoring JSON-RPC endpoint and the series to export
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_monitoring_url")]
    pub api_url: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Longest history span requested per call, in days
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    #[serde(default)]
    pub targets: Vec<MetricTarget>,
}

/// One exported series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTarget {
    pub hostgroup: String,
    pub metric: String,
    pub item_id: String,
}

fn default_target_nsd_name() -> String {
    "alpine_2vnf_ns".to_string()
}

fn default_scenarios() -> Vec<u32> {
    vec![1]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_orchestrator_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_prefix() -> String {
    "/api/v0.1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_vim_type() -> String {
    "fog05".to_string()
}

fn default_description() -> String {
    "MTO EVAL Tests".to_string()
}

fn default_ttl() -> u32 {
    300
}

fn default_mec_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_platform_id() -> String {
    "testp".to_string()
}

fn default_monitoring_url() -> String {
    "http://localhost/zabbix/api_jsonrpc.php".to_string()
}

fn default_max_days() -> u32 {
    15
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_orchestrator_url(),
            api_prefix: default_api_prefix(),
            request_timeout_secs: default_request_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for VimConfig {
    fn default() -> Self {
        Self {
            tenant: String::new(),
            url: String::new(),
            user: String::new(),
            password: String::new(),
            vim_type: default_vim_type(),
            description: default_description(),
            config: None,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            poll_interval_ms: 0,
            on_unreachable: UnreachablePolicy::default(),
        }
    }
}

impl Default for MecConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_mec_url(),
            platform_id: default_platform_id(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            api_url: default_monitoring_url(),
            user: String::new(),
            password: String::new(),
            accept_invalid_certs: false,
            request_timeout_secs: default_request_timeout(),
            max_days: default_max_days(),
            targets: Vec::new(),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            vim: VimConfig::default(),
            target_nsd_name: default_target_nsd_name(),
            poller: PollerConfig::default(),
            scenarios: default_scenarios(),
            mec: MecConfig::default(),
            monitoring: MonitoringConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl EvalConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Without an explicit path the per-user file is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(
                        config::File::from(default_path.as_path()).required(false),
                    );
                }
            }
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("MTO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let parsed: EvalConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Per-user configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("mto-eval").join("config.toml"))
    }

    /// Reject settings the components cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.poller.ttl == 0 {
            return Err(EvalError::invalid_config("poller.ttl must be at least 1"));
        }
        if !(1..=30).contains(&self.monitoring.max_days) {
            return Err(EvalError::invalid_config(format!(
                "monitoring.max_days must be between 1 and 30, got {}",
                self.monitoring.max_days
            )));
        }
        if self.scenarios.is_empty() {
            return Err(EvalError::invalid_config("scenarios must not be empty"));
        }
        if self.scenarios.contains(&0) {
            return Err(EvalError::invalid_config(
                "scenario instance counts must be positive",
            ));
        }
        // Targets sharing a hostgroup and metric would share an export file
        let mut seen = HashSet::new();
        for target in &self.monitoring.targets {
            if !seen.insert((target.hostgroup.as_str(), target.metric.as_str())) {
                return Err(EvalError::invalid_config(format!(
                    "duplicate monitoring target {}/{}",
                    target.hostgroup, target.metric
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EvalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poller.ttl, 300);
        assert_eq!(config.monitoring.max_days, 15);
        assert_eq!(config.target_nsd_name, "alpine_2vnf_ns");
        assert_eq!(config.mec.platform_id, "testp");
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
target_nsd_name = "cirros_ns"
scenarios = [1, 5, 10]
output_dir = "/tmp/mto"

[orchestrator]
base_url = "https://mto.example:8443"

[vim]
tenant = "admin"
url = "10.0.0.1:8080"
user = "fog"
password = "secret"

[poller]
ttl = 20
on_unreachable = "abort"

[monitoring]
max_days = 7

[[monitoring.targets]]
hostgroup = "mto"
metric = "cpu"
item_id = "28778"
"#,
        );

        let config = EvalConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.target_nsd_name, "cirros_ns");
        assert_eq!(config.scenarios, vec![1, 5, 10]);
        assert_eq!(config.orchestrator.base_url, "https://mto.example:8443");
        assert_eq!(config.orchestrator.api_prefix, "/api/v0.1");
        assert_eq!(config.vim.tenant, "admin");
        assert_eq!(config.vim.vim_type, "fog05");
        assert_eq!(config.poller.ttl, 20);
        assert_eq!(config.poller.on_unreachable, UnreachablePolicy::Abort);
        assert_eq!(config.monitoring.max_days, 7);
        assert_eq!(
            config.monitoring.targets,
            vec![MetricTarget {
                hostgroup: "mto".into(),
                metric: "cpu".into(),
                item_id: "28778".into(),
            }]
        );
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let file = write_config("[poller]\nttl = 0\n");
        let err = EvalConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfig { .. }));
    }

    #[test]
    fn test_rejects_max_days_out_of_range() {
        let mut config = EvalConfig::default();
        config.monitoring.max_days = 31;
        assert!(config.validate().is_err());
        config.monitoring.max_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_scenarios() {
        let mut config = EvalConfig::default();
        config.scenarios.clear();
        assert!(config.validate().is_err());
        config.scenarios = vec![2, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_targets() {
        let target = |metric: &str, item_id: &str| MetricTarget {
            hostgroup: "mto".into(),
            metric: metric.into(),
            item_id: item_id.into(),
        };
        let mut config = EvalConfig::default();
        config.monitoring.targets = vec![target("cpu", "28778"), target("mem", "28779")];
        assert!(config.validate().is_ok());

        config.monitoring.targets.push(target("cpu", "30000"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mto/cpu"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = EvalConfig::load(Some(Path::new("/nonexistent/mto-eval.toml"))).unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }
}
