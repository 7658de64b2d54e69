//! MEC platform application registration

use crate::config::MecConfig;
use crate::error::{EvalError, Result};
use crate::http::{build_client, is_accepted, join, parse_base_url};
use crate::models::AppDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A MEC platform accepting application descriptors
#[async_trait]
pub trait MecPlatform: Send + Sync {
    /// Register `appd` on `platform_id` and return the platform's
    /// `ApplicationInfo` object
    async fn register_app(&self, platform_id: &str, appd: &AppDescriptor) -> Result<Value>;
}

/// HTTP client for the MEC platform management API
pub struct MecClient {
    client: Client,
    base_url: Url,
}

impl MecClient {
    pub fn new(config: &MecConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(30), false)?;
        let base_url = parse_base_url(&config.base_url)?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl MecPlatform for MecClient {
    async fn register_app(&self, platform_id: &str, appd: &AppDescriptor) -> Result<Value> {
        let url = join(
            &self.base_url,
            &format!("platforms/{}/applications", platform_id),
        )?;

        let response = self.client.post(url).json(appd).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !is_accepted(status) {
            return Err(EvalError::Mec {
                reason: format!("platform {} returned {}: {}", platform_id, status, text),
            });
        }

        let mut body: Value = serde_json::from_str(&text).map_err(|e| EvalError::Mec {
            reason: format!("malformed registration response: {}", e),
        })?;

        match body.get_mut("ApplicationInfo") {
            Some(info) => Ok(info.take()),
            None => Err(EvalError::Mec {
                reason: "registration response lacks ApplicationInfo".to_string(),
            }),
        }
    }
}
