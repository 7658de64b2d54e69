//! JSON-RPC client for the monitoring API

use super::HistoryBackend;
use crate::config::MonitoringConfig;
use crate::error::{EvalError, Result};
use crate::http::build_client;
use crate::models::{HistoryRecord, ItemInfo, ValueType};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

/// Authenticated session against the monitoring JSON-RPC endpoint
pub struct MonitoringClient {
    client: Client,
    api_url: Url,
    auth: Option<String>,
    next_id: AtomicU64,
}

impl MonitoringClient {
    pub fn new(config: &MonitoringConfig) -> Result<Self> {
        let client = build_client(
            Duration::from_secs(config.request_timeout_secs),
            config.accept_invalid_certs,
        )?;
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            EvalError::invalid_config(format!("invalid monitoring URL '{}': {}", config.api_url, e))
        })?;

        Ok(Self {
            client,
            api_url,
            auth: None,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a client and log in with the configured credentials
    pub async fn connect(config: &MonitoringConfig) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.login(&config.user, &config.password).await?;
        Ok(client)
    }

    /// Open a session; later calls carry its token
    pub async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        self.auth = None;
        let token: String = self
            .call(
                "user.login",
                json!({
                    "username": user,
                    "password": password,
                }),
            )
            .await?;
        info!(api_url = %self.api_url, user = %user, "Logged in to monitoring API");
        self.auth = Some(token);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        if let Some(auth) = &self.auth {
            request["auth"] = Value::String(auth.clone());
        }

        debug!(method = %method, id = id, "Monitoring API call");
        let response = self
            .client
            .post(self.api_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::monitoring(format!(
                "{} returned {}: {}",
                method, status, body
            )));
        }

        let body: RpcResponse<T> = response.json().await?;
        match (body.result, body.error) {
            (_, Some(error)) => Err(EvalError::monitoring(format!(
                "{} failed ({}): {}{}",
                method,
                error.code,
                error.message,
                error.data.map(|d| format!(" {}", d)).unwrap_or_default()
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(EvalError::monitoring(format!(
                "{} returned neither result nor error",
                method
            ))),
        }
    }
}

#[async_trait]
impl HistoryBackend for MonitoringClient {
    async fn items(&self, item_id: &str) -> Result<Vec<ItemInfo>> {
        self.call(
            "item.get",
            json!({
                "itemids": item_id,
                "output": ["itemid", "value_type"],
            }),
        )
        .await
    }

    async fn history(
        &self,
        item_id: &str,
        value_type: ValueType,
        time_from: i64,
        time_till: i64,
    ) -> Result<Vec<HistoryRecord>> {
        // The API treats time_till as inclusive.
        self.call(
            "history.get",
            json!({
                "itemids": item_id,
                "history": value_type.code(),
                "time_from": time_from,
                "time_till": time_till - 1,
                "sortfield": "clock",
                "sortorder": "ASC",
                "output": "extend",
            }),
        )
        .await
    }
}
