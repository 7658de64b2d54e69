//! Evaluation library for NFV/MEC orchestration
//!
//! This crate provides the core functionality for:
//! - Provisioning VIM accounts and NS instances through the orchestrator
//! - Polling NS lifecycle status under a per-instance fetch budget
//! - Registering a MEC application descriptor
//! - Exporting monitoring history to CSV
//! - Structured logging and run metrics

pub mod config;
pub mod driver;
pub mod error;
pub mod http;
pub mod mec;
pub mod models;
pub mod monitoring;
pub mod observability;
pub mod orchestrator;
pub mod output;
pub mod poller;

pub use config::{EvalConfig, MetricTarget, UnreachablePolicy};
pub use driver::{elapsed_minutes, ProvisioningDriver, ScenarioReport};
pub use error::{EvalError, Result};
pub use models::*;
pub use observability::{EvalMetrics, EventLogger};
pub use poller::{LifecyclePoller, PollReport, Retirement};
