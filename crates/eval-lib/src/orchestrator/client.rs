//! HTTP client for the orchestrator REST API

use super::{async_trait, NsStatusSource, Orchestrator};
use crate::config::OrchestratorConfig;
use crate::error::{EvalError, Result};
use crate::http::{build_client, decode, is_accepted, join, parse_base_url};
use crate::models::{
    CreatedResource, NsDescriptor, NsInstantiateRequest, NsStatus, VimAccountRequest,
};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

const VIM_PATH: &str = "nfv_mano/vim";
const NS_DESCRIPTORS_PATH: &str = "nfv_mano/ns_descriptors";
const NS_INSTANCES_PATH: &str = "generic_service";

/// API client for the orchestrator
pub struct OrchestratorClient {
    client: Client,
    base_url: Url,
}

impl OrchestratorClient {
    /// Create a new client rooted at `base_url` + `api_prefix`
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        let client = build_client(
            Duration::from_secs(config.request_timeout_secs),
            config.accept_invalid_certs,
        )?;
        let base_url = parse_base_url(&format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.api_prefix
        ))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST a JSON body and extract the `id` the orchestrator assigned
    async fn create<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<String> {
        let url = join(&self.base_url, path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| EvalError::provisioning(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !is_accepted(status) {
            return Err(EvalError::provisioning(format!(
                "{} rejected ({}): {}",
                what, status, text
            )));
        }

        let created: CreatedResource = decode(&text, what)?;
        Ok(created.id)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = join(&self.base_url, path)?;
        let response = self.client.delete(url).send().await?;

        let status = response.status();
        if !is_accepted(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::provisioning(format!(
                "delete {} returned {}: {}",
                path, status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NsStatusSource for OrchestratorClient {
    async fn ns_status(&self, instance_id: &str) -> Result<NsStatus> {
        let url = join(&self.base_url, &format!("{}/{}", NS_INSTANCES_PATH, instance_id))?;

        let unreachable = |reason: String| EvalError::InstanceUnreachable {
            instance_id: instance_id.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| unreachable(e.to_string()))?;
        if !is_accepted(status) {
            return Err(unreachable(format!("status {}", status)));
        }

        // An unparsable body counts as an unreachable instance
        serde_json::from_str(&text)
            .map_err(|e| unreachable(format!("malformed NS instance response: {}", e)))
    }
}

#[async_trait]
impl Orchestrator for OrchestratorClient {
    async fn create_vim_account(&self, request: &VimAccountRequest) -> Result<String> {
        debug!(name = %request.name, "Creating VIM account");
        self.create(VIM_PATH, request, "VIM account").await
    }

    async fn delete_vim_account(&self, account_id: &str) -> Result<()> {
        self.delete(&format!("{}/{}", VIM_PATH, account_id)).await
    }

    async fn list_ns_descriptors(&self) -> Result<Vec<NsDescriptor>> {
        let url = join(&self.base_url, NS_DESCRIPTORS_PATH)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !is_accepted(status) {
            return Err(EvalError::provisioning(format!(
                "listing NS descriptors returned {}: {}",
                status, text
            )));
        }

        decode(&text, "NS descriptor list")
    }

    async fn instantiate_ns(
        &self,
        nsd_id: &str,
        name: &str,
        description: &str,
        vim_account_id: &str,
    ) -> Result<String> {
        let request = NsInstantiateRequest {
            nsd_id: nsd_id.to_string(),
            ns_name: name.to_string(),
            ns_description: description.to_string(),
            vim_account_id: vim_account_id.to_string(),
        };
        debug!(nsd_id = %nsd_id, name = %name, "Instantiating NS");
        self.create(NS_INSTANCES_PATH, &request, "NS instantiation").await
    }

    async fn delete_ns_instance(&self, instance_id: &str) -> Result<()> {
        self.delete(&format!("{}/{}", NS_INSTANCES_PATH, instance_id)).await
    }
}
