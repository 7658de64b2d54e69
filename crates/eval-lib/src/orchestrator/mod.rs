//! Orchestrator (MTO) REST API access
//!
//! The driver and the poller depend on the traits below; `OrchestratorClient`
//! is the HTTP implementation used in real runs.

mod client;


pub use client::OrchestratorClient;

use crate::error::Result;
use crate::models::{NsDescriptor, NsStatus, VimAccountRequest};

pub use async_trait::async_trait;

/// Source of NS instance status observations
#[async_trait]
pub trait NsStatusSource: Send + Sync {
    /// Fetch the current status of one instance
    ///
    /// A failed fetch must surface as `EvalError::InstanceUnreachable`.
    async fn ns_status(&self, instance_id: &str) -> Result<NsStatus>;
}

/// Operations the provisioning driver performs against the orchestrator
#[async_trait]
pub trait Orchestrator: NsStatusSource {
    /// Create a VIM account and return its identifier
    async fn create_vim_account(&self, request: &VimAccountRequest) -> Result<String>;

    async fn delete_vim_account(&self, account_id: &str) -> Result<()>;

    async fn list_ns_descriptors(&self) -> Result<Vec<NsDescriptor>>;

    /// Instantiate an NS and return the instance identifier
    async fn instantiate_ns(
        &self,
        nsd_id: &str,
        name: &str,
        description: &str,
        vim_account_id: &str,
    ) -> Result<String>;

    async fn delete_ns_instance(&self, instance_id: &str) -> Result<()>;
}
