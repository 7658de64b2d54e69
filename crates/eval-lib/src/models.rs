//! Core data models exchanged with the orchestrator, the MEC platform and
//! the monitoring backend

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Body of a VIM account creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VimAccountRequest {
    pub name: String,
    pub vim_tenant_name: String,
    pub vim_url: String,
    pub vim_user: String,
    pub vim_password: String,
    pub vim_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Response of any create call; the orchestrator must assign an `id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResource {
    pub id: String,
}

/// NS descriptor as listed by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsDescriptor {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// Body of an NS instantiation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsInstantiateRequest {
    pub nsd_id: String,
    pub ns_name: String,
    pub ns_description: String,
    pub vim_account_id: String,
}

/// Observed status of an NS instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsStatus {
    #[serde(rename = "operational-status")]
    pub operational_status: String,
    #[serde(rename = "config-status")]
    pub config_status: String,
}

impl NsStatus {
    pub fn new(operational_status: impl Into<String>, config_status: impl Into<String>) -> Self {
        Self {
            operational_status: operational_status.into(),
            config_status: config_status.into(),
        }
    }

    /// Terminal condition reported by this status, if any
    pub fn terminal_reason(&self) -> Option<RetireReason> {
        if self.operational_status == "failed" {
            Some(RetireReason::Failed)
        } else if self.config_status == "configured" {
            Some(RetireReason::Configured)
        } else if self.operational_status == "terminating" {
            Some(RetireReason::Terminating)
        } else {
            None
        }
    }
}

/// Why an instance left the poller's pending set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetireReason {
    Failed,
    Configured,
    Terminating,
    /// Attempt budget ran out while the status never became terminal
    Exhausted,
    /// Attempt budget ran out on a failed status fetch
    Unreachable,
}

impl RetireReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetireReason::Failed => "failed",
            RetireReason::Configured => "configured",
            RetireReason::Terminating => "terminating",
            RetireReason::Exhausted => "exhausted",
            RetireReason::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency constraint of a MEC application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLatency {
    pub time_unit: u32,
    pub latency: String,
}

/// MEC application descriptor (AppD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub app_d_id: String,
    pub app_name: String,
    pub app_provider: String,
    pub app_d_version: String,
    pub app_soft_version: String,
    pub mec_version: Vec<String>,
    pub app_description: String,
    pub app_service_required: Vec<Value>,
    pub app_service_optional: Vec<Value>,
    pub app_service_produced: Vec<Value>,
    pub app_feature_required: Vec<Value>,
    pub app_feature_optional: Vec<Value>,
    pub transport_dependencies: Vec<Value>,
    pub app_traffic_rule: Vec<Value>,
    #[serde(rename = "appDNSRule")]
    pub app_dns_rule: Vec<Value>,
    pub app_latency: AppLatency,
}

impl AppDescriptor {
    /// The fixed example application registered during evaluations
    pub fn example() -> Self {
        Self {
            app_d_id: "example-meapp1".to_string(),
            app_name: "example_mec_application".to_string(),
            app_provider: "ADLINK".to_string(),
            app_d_version: "1.0".to_string(),
            app_soft_version: String::new(),
            mec_version: vec!["1".to_string()],
            app_description: "Simple MEC Application".to_string(),
            app_service_required: Vec::new(),
            app_service_optional: Vec::new(),
            app_service_produced: Vec::new(),
            app_feature_required: Vec::new(),
            app_feature_optional: Vec::new(),
            transport_dependencies: Vec::new(),
            app_traffic_rule: Vec::new(),
            app_dns_rule: Vec::new(),
            app_latency: AppLatency {
                time_unit: 10,
                latency: "ms".to_string(),
            },
        }
    }
}

/// History value type of a monitoring item; `history.get` is typed by it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Character,
    Log,
    Unsigned,
    Text,
}

impl ValueType {
    /// Numeric code used by the monitoring API
    pub fn code(&self) -> u8 {
        match self {
            ValueType::Float => 0,
            ValueType::Character => 1,
            ValueType::Log => 2,
            ValueType::Unsigned => 3,
            ValueType::Text => 4,
        }
    }
}

impl TryFrom<&str> for ValueType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "0" => Ok(ValueType::Float),
            "1" => Ok(ValueType::Character),
            "2" => Ok(ValueType::Log),
            "3" => Ok(ValueType::Unsigned),
            "4" => Ok(ValueType::Text),
            other => Err(format!("unknown value type '{}'", other)),
        }
    }
}

/// Item metadata returned by `item.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInfo {
    #[serde(default)]
    pub itemid: String,
    pub value_type: String,
}

/// One metric sample; field order is preserved as received
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryRecord(pub Map<String, Value>);

impl HistoryRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Sample time as a Unix timestamp, whether sent as a string or a number
    pub fn clock(&self) -> Option<i64> {
        match self.0.get("clock")? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_reason_order() {
        assert_eq!(
            NsStatus::new("failed", "configured").terminal_reason(),
            Some(RetireReason::Failed)
        );
        assert_eq!(
            NsStatus::new("running", "configured").terminal_reason(),
            Some(RetireReason::Configured)
        );
        assert_eq!(
            NsStatus::new("terminating", "init").terminal_reason(),
            Some(RetireReason::Terminating)
        );
        assert_eq!(NsStatus::new("init", "init").terminal_reason(), None);
    }

    #[test]
    fn test_app_descriptor_wire_names() {
        let value = serde_json::to_value(AppDescriptor::example()).unwrap();
        assert_eq!(value["appDId"], "example-meapp1");
        assert_eq!(value["appDVersion"], "1.0");
        assert_eq!(value["appDNSRule"], json!([]));
        assert_eq!(value["appLatency"], json!({"timeUnit": 10, "latency": "ms"}));
    }

    #[test]
    fn test_instantiate_request_wire_names() {
        let req = NsInstantiateRequest {
            nsd_id: "nsd".into(),
            ns_name: "name".into(),
            ns_description: "desc".into(),
            vim_account_id: "vim".into(),
        };
        let value = serde_json::to_value(req).unwrap();
        assert_eq!(value["nsdId"], "nsd");
        assert_eq!(value["vimAccountId"], "vim");
    }

    #[test]
    fn test_value_type_codes() {
        assert_eq!(ValueType::try_from("0").unwrap(), ValueType::Float);
        assert_eq!(ValueType::try_from("4").unwrap().code(), 4);
        assert!(ValueType::try_from("9").is_err());
    }

    #[test]
    fn test_history_record_clock() {
        let record: HistoryRecord =
            serde_json::from_value(json!({"itemid": "1", "clock": "1500000000", "value": "2"}))
                .unwrap();
        assert_eq!(record.clock(), Some(1_500_000_000));

        let record: HistoryRecord = serde_json::from_value(json!({"clock": 42})).unwrap();
        assert_eq!(record.clock(), Some(42));

        assert_eq!(HistoryRecord::default().clock(), None);
    }

    #[test]
    fn test_history_record_preserves_field_order() {
        let record: HistoryRecord =
            serde_json::from_str(r#"{"value": "1", "clock": "2", "ns": "3"}"#).unwrap();
        let keys: Vec<&str> = record.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["value", "clock", "ns"]);
    }
}
