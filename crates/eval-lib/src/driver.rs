//! Provisioning driver
//!
//! Runs one evaluation scenario: create VIM accounts and NS instances, drain
//! the lifecycle poller, optionally register the MEC AppD, then tear down
//! everything that was created. Teardown runs on every exit path.

use crate::config::{EvalConfig, PollerConfig, VimConfig};
use crate::error::{EvalError, Result};
use crate::mec::MecPlatform;
use crate::models::{AppDescriptor, NsDescriptor, VimAccountRequest};
use crate::observability::{EvalMetrics, EventLogger};
use crate::orchestrator::Orchestrator;
use crate::poller::{LifecyclePoller, PollReport};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Resources created during a scenario, in creation order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceLedger {
    pub vim_accounts: Vec<String>,
    pub ns_instances: Vec<String>,
}

/// Result of the optional MEC registration step
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MecOutcome {
    #[default]
    Skipped,
    Registered {
        application_info: Value,
    },
    Failed {
        error: String,
    },
}

/// A delete call that failed during teardown
#[derive(Debug, Clone, Serialize)]
pub struct TeardownFailure {
    pub kind: &'static str,
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub deleted_ns_instances: usize,
    pub deleted_vim_accounts: usize,
    pub failures: Vec<TeardownFailure>,
}

/// Everything a finished scenario produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub run_id: String,
    pub requested: u32,
    pub ledger: ResourceLedger,
    pub poll: PollReport,
    pub mec: MecOutcome,
    pub teardown: TeardownReport,
    pub elapsed_secs: f64,
    /// Elapsed wall-clock time rounded up to whole minutes
    pub elapsed_minutes: u64,
}

/// Drives evaluation scenarios against an orchestrator
pub struct ProvisioningDriver {
    orchestrator: Arc<dyn Orchestrator>,
    mec: Option<(Arc<dyn MecPlatform>, String)>,
    vim: VimConfig,
    target_nsd_name: String,
    poller: PollerConfig,
    shutdown: Option<watch::Receiver<bool>>,
    metrics: EvalMetrics,
}

impl ProvisioningDriver {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, config: &EvalConfig) -> Self {
        Self {
            orchestrator,
            mec: None,
            vim: config.vim.clone(),
            target_nsd_name: config.target_nsd_name.clone(),
            poller: config.poller.clone(),
            shutdown: None,
            metrics: EvalMetrics::new(),
        }
    }

    /// Register the example AppD on `platform_id` after polling
    pub fn with_mec(
        mut self,
        platform: Arc<dyn MecPlatform>,
        platform_id: impl Into<String>,
    ) -> Self {
        self.mec = Some((platform, platform_id.into()));
        self
    }

    /// Stop scenarios once `shutdown` holds `true`
    ///
    /// A raised flag cancels polling in progress and keeps later scenarios
    /// from provisioning anything.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run one scenario with `count` VIM accounts and NS instances
    ///
    /// A failure while creating or polling aborts the scenario; resources
    /// created up to that point are still deleted before the error is
    /// returned.
    pub async fn run_scenario(&self, count: u32) -> Result<ScenarioReport> {
        if self.shutdown_requested() {
            return Err(EvalError::Cancelled);
        }

        let started = Instant::now();
        let run_id = next_run_id(count);
        let logger = EventLogger::new(run_id.clone());
        logger.log_run_started(count, self.poller.ttl);

        let mut ledger = ResourceLedger::default();
        let polled = self.provision_and_poll(count, &run_id, &mut ledger, &logger).await;

        let mec = match &polled {
            Ok(_) => self.register_mec(&logger).await,
            Err(_) => MecOutcome::Skipped,
        };

        let teardown = self.teardown(&ledger, &logger).await;
        let elapsed = started.elapsed();
        let minutes = elapsed_minutes(elapsed);
        logger.log_run_finished(minutes, teardown.failures.len());

        let poll = match polled {
            Ok(poll) => poll,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Scenario aborted after teardown");
                return Err(e);
            }
        };

        Ok(ScenarioReport {
            run_id,
            requested: count,
            ledger,
            poll,
            mec,
            teardown,
            elapsed_secs: elapsed.as_secs_f64(),
            elapsed_minutes: minutes,
        })
    }

    async fn provision_and_poll(
        &self,
        count: u32,
        run_id: &str,
        ledger: &mut ResourceLedger,
        logger: &EventLogger,
    ) -> Result<PollReport> {
        let mut poller = LifecyclePoller::from_config(&self.poller).with_logger(logger.clone());
        if let Some(shutdown) = &self.shutdown {
            poller = poller.with_shutdown(shutdown.clone());
        }

        for n in 1..=count {
            let vim_name = resource_name("vim", run_id, n);
            let request = self.vim_request(&vim_name);
            let account_id = self.orchestrator.create_vim_account(&request).await?;
            ledger.vim_accounts.push(account_id.clone());
            logger.log_vim_account_created(&vim_name, &account_id);

            let descriptors = self.orchestrator.list_ns_descriptors().await?;
            let nsd = select_descriptor(&descriptors, &self.target_nsd_name)?;

            let ns_name = resource_name("ns", run_id, n);
            let instance_id = self
                .orchestrator
                .instantiate_ns(&nsd.id, &ns_name, &self.vim.description, &account_id)
                .await?;
            ledger.ns_instances.push(instance_id.clone());
            logger.log_ns_instantiated(&nsd.id, &instance_id, &account_id);

            poller.enqueue(instance_id);
        }

        info!(pending = poller.pending_len(), "Polling NS instances");
        let drained = poller.drain(self.orchestrator.as_ref()).await;
        if drained.is_err() {
            let partial = poller.take_partial_report();
            warn!(
                run_id = %run_id,
                retired = partial.retirements.len(),
                pending = poller.pending_len(),
                fetches = partial.fetches,
                "Polling interrupted"
            );
        }
        drained
    }

    fn vim_request(&self, name: &str) -> VimAccountRequest {
        VimAccountRequest {
            name: name.to_string(),
            vim_tenant_name: self.vim.tenant.clone(),
            vim_url: self.vim.url.clone(),
            vim_user: self.vim.user.clone(),
            vim_password: self.vim.password.clone(),
            vim_type: self.vim.vim_type.clone(),
            description: self.vim.description.clone(),
            config: self.vim.config.clone(),
        }
    }

    async fn register_mec(&self, logger: &EventLogger) -> MecOutcome {
        let Some((platform, platform_id)) = &self.mec else {
            return MecOutcome::Skipped;
        };

        let appd = AppDescriptor::example();
        match platform.register_app(platform_id, &appd).await {
            Ok(application_info) => {
                logger.log_mec_registration(platform_id, &appd.app_d_id, None);
                MecOutcome::Registered { application_info }
            }
            Err(e) => {
                let error = e.to_string();
                logger.log_mec_registration(platform_id, &appd.app_d_id, Some(&error));
                MecOutcome::Failed { error }
            }
        }
    }

    /// Delete NS instances, then VIM accounts, each in creation order
    async fn teardown(&self, ledger: &ResourceLedger, logger: &EventLogger) -> TeardownReport {
        let mut report = TeardownReport::default();

        for id in &ledger.ns_instances {
            match self.orchestrator.delete_ns_instance(id).await {
                Ok(()) => {
                    logger.log_deleted("ns_instance", id);
                    report.deleted_ns_instances += 1;
                }
                Err(e) => self.record_failure(&mut report, logger, "ns_instance", id, e),
            }
        }

        for id in &ledger.vim_accounts {
            match self.orchestrator.delete_vim_account(id).await {
                Ok(()) => {
                    logger.log_deleted("vim_account", id);
                    report.deleted_vim_accounts += 1;
                }
                Err(e) => self.record_failure(&mut report, logger, "vim_account", id, e),
            }
        }

        report
    }

    fn record_failure(
        &self,
        report: &mut TeardownReport,
        logger: &EventLogger,
        kind: &'static str,
        id: &str,
        error: EvalError,
    ) {
        let error = error.to_string();
        logger.log_teardown_failed(kind, id, &error);
        self.metrics.inc_teardown_failures();
        report.failures.push(TeardownFailure {
            kind,
            id: id.to_string(),
            error,
        });
    }
}

/// Pick the descriptor whose name matches `name` exactly
pub fn select_descriptor<'a>(
    descriptors: &'a [NsDescriptor],
    name: &str,
) -> Result<&'a NsDescriptor> {
    descriptors
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| EvalError::DescriptorNotFound {
            name: name.to_string(),
        })
}

/// Round a duration up to whole minutes, never below one
pub fn elapsed_minutes(elapsed: Duration) -> u64 {
    (elapsed.as_millis() as u64).div_ceil(60_000).max(1)
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// `{UTC stamp}-{sequence}-{count}`, unique within the process
fn next_run_id(count: u32) -> String {
    let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), seq, count)
}

fn resource_name(kind: &str, run_id: &str, n: u32) -> String {
    format!("mto-eval-{}-{}-{}", kind, run_id, n)
}
