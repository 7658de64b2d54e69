//! NS lifecycle poller
//!
//! Tracks the instances created in a run and polls them round-robin until
//! each one reaches a terminal status or spends its attempt budget. The
//! pending set is a queue: the front entry is visited, charged one attempt,
//! then either retired or moved to the back.

use crate::config::{PollerConfig, UnreachablePolicy};
use crate::error::{EvalError, Result};
use crate::models::{NsStatus, RetireReason};
use crate::observability::{EvalMetrics, EventLogger};
use crate::orchestrator::NsStatusSource;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// A pending instance and the status fetches it has left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEntry {
    pub instance_id: String,
    pub remaining: u32,
    attempts: u32,
}

/// An instance leaving the pending set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Retirement {
    pub instance_id: String,
    pub reason: RetireReason,
    /// Status fetches spent on this instance
    pub attempts: u32,
    /// Last status observed, if any fetch succeeded
    pub last_status: Option<NsStatus>,
}

/// Outcome of draining the pending set
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollReport {
    pub retirements: Vec<Retirement>,
    pub fetches: u64,
}

impl PollReport {
    pub fn count(&self, reason: RetireReason) -> usize {
        self.retirements.iter().filter(|r| r.reason == reason).count()
    }
}

/// Round-robin poller over pending NS instances
pub struct LifecyclePoller {
    pending: VecDeque<PollEntry>,
    last_status: HashMap<String, NsStatus>,
    ttl: u32,
    poll_interval: Duration,
    on_unreachable: UnreachablePolicy,
    shutdown: Option<watch::Receiver<bool>>,
    logger: Option<EventLogger>,
    metrics: EvalMetrics,
    report: PollReport,
}

impl LifecyclePoller {
    /// Create a poller giving every instance `ttl` fetches (at least one)
    pub fn new(ttl: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            last_status: HashMap::new(),
            ttl: ttl.max(1),
            poll_interval: Duration::ZERO,
            on_unreachable: UnreachablePolicy::default(),
            shutdown: None,
            logger: None,
            metrics: EvalMetrics::new(),
            report: PollReport::default(),
        }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(config.ttl)
            .with_poll_interval(config.poll_interval())
            .with_unreachable_policy(config.on_unreachable)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_unreachable_policy(mut self, policy: UnreachablePolicy) -> Self {
        self.on_unreachable = policy;
        self
    }

    /// Abort `drain` once `shutdown` holds `true`
    ///
    /// The flag is a latch: a request raised before `drain` starts cancels
    /// it before the first fetch.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_logger(mut self, logger: EventLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Add an instance to the back of the pending set with a full budget
    pub fn enqueue(&mut self, instance_id: impl Into<String>) {
        self.pending.push_back(PollEntry {
            instance_id: instance_id.into(),
            remaining: self.ttl,
            attempts: 0,
        });
    }

    pub fn pending(&self) -> impl Iterator<Item = &PollEntry> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Retirements and fetches of an interrupted `drain`
    pub fn partial_report(&self) -> &PollReport {
        &self.report
    }

    pub fn take_partial_report(&mut self) -> PollReport {
        std::mem::take(&mut self.report)
    }

    /// Poll until the pending set is empty
    ///
    /// On `Cancelled` or an aborting `InstanceUnreachable`, the entry being
    /// visited stays at the front of the pending set and the retirements so
    /// far remain available through `partial_report`; a later call resumes
    /// where this one stopped and returns the combined report.
    pub async fn drain<S>(&mut self, source: &S) -> Result<PollReport>
    where
        S: NsStatusSource + ?Sized,
    {
        while let Some(mut entry) = self.pending.pop_front() {
            if self.report.fetches > 0 && !self.poll_interval.is_zero() {
                tokio::time::sleep(self.poll_interval).await;
            }

            let started = Instant::now();
            let fetched = match self.shutdown.as_mut() {
                Some(shutdown) => {
                    tokio::select! {
                        biased;
                        Ok(_) = shutdown.wait_for(|stop| *stop) => None,
                        fetched = source.ns_status(&entry.instance_id) => Some(fetched),
                    }
                }
                None => Some(source.ns_status(&entry.instance_id).await),
            };
            let Some(fetched) = fetched else {
                self.pending.push_front(entry);
                return Err(EvalError::Cancelled);
            };
            self.metrics
                .observe_status_fetch_latency(started.elapsed().as_secs_f64());

            self.report.fetches += 1;
            entry.remaining = entry.remaining.saturating_sub(1);
            entry.attempts += 1;

            let verdict = match fetched {
                Ok(status) => {
                    if let Some(logger) = &self.logger {
                        logger.log_ns_status(&entry.instance_id, &status, entry.remaining);
                    }
                    let verdict = status.terminal_reason().or_else(|| {
                        (entry.remaining == 0).then_some(RetireReason::Exhausted)
                    });
                    self.last_status.insert(entry.instance_id.clone(), status);
                    verdict
                }
                Err(EvalError::InstanceUnreachable { instance_id, reason }) => {
                    match self.on_unreachable {
                        UnreachablePolicy::Abort => {
                            self.pending.push_front(entry);
                            return Err(EvalError::InstanceUnreachable { instance_id, reason });
                        }
                        UnreachablePolicy::Retry => {
                            warn!(
                                instance_id = %instance_id,
                                remaining = entry.remaining,
                                reason = %reason,
                                "NS status fetch failed"
                            );
                            (entry.remaining == 0).then_some(RetireReason::Unreachable)
                        }
                    }
                }
                Err(other) => {
                    self.pending.push_front(entry);
                    return Err(other);
                }
            };

            match verdict {
                Some(reason) => {
                    let retirement = Retirement {
                        last_status: self.last_status.remove(&entry.instance_id),
                        instance_id: entry.instance_id,
                        reason,
                        attempts: entry.attempts,
                    };
                    self.metrics.inc_retired(reason);
                    if let Some(logger) = &self.logger {
                        logger.log_ns_retired(&retirement.instance_id, reason, retirement.attempts);
                    }
                    self.report.retirements.push(retirement);
                }
                None => {
                    debug!(
                        instance_id = %entry.instance_id,
                        remaining = entry.remaining,
                        "NS instance still pending"
                    );
                    self.pending.push_back(entry);
                }
            }
        }

        Ok(std::mem::take(&mut self.report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted status source recording the order of fetches
    #[derive(Default)]
    struct ScriptedSource {
        /// Per instance, the statuses returned on successive visits; the
        /// last one repeats once the script runs out
        scripts: HashMap<String, Vec<Option<NsStatus>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn with(mut self, id: &str, script: Vec<Option<NsStatus>>) -> Self {
            self.scripts.insert(id.to_string(), script);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn visits(&self, id: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == id).count()
        }
    }

    #[async_trait]
    impl NsStatusSource for ScriptedSource {
        async fn ns_status(&self, instance_id: &str) -> Result<NsStatus> {
            let visit = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(instance_id.to_string());
                calls.iter().filter(|c| c.as_str() == instance_id).count() - 1
            };

            let building = || Some(NsStatus::new("init", "init"));
            let step = match self.scripts.get(instance_id) {
                Some(script) if !script.is_empty() => {
                    script[visit.min(script.len() - 1)].clone()
                }
                _ => building(),
            };

            step.ok_or_else(|| EvalError::InstanceUnreachable {
                instance_id: instance_id.to_string(),
                reason: "status 503".to_string(),
            })
        }
    }

    fn pending() -> Option<NsStatus> {
        Some(NsStatus::new("init", "init"))
    }

    fn configured() -> Option<NsStatus> {
        Some(NsStatus::new("running", "configured"))
    }

    fn poller_with(ttl: u32, ids: &[&str]) -> LifecyclePoller {
        let mut poller = LifecyclePoller::new(ttl);
        for id in ids {
            poller.enqueue(*id);
        }
        poller
    }

    #[tokio::test]
    async fn test_empty_pending_set_returns_immediately() {
        let source = ScriptedSource::default();
        let mut poller = LifecyclePoller::new(5);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(report.fetches, 0);
        assert!(report.retirements.is_empty());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_configured_on_first_poll_costs_one_fetch() {
        let source = ScriptedSource::default().with("ns-1", vec![configured()]);
        let mut poller = poller_with(10, &["ns-1"]);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(report.fetches, 1);
        assert_eq!(report.retirements[0].reason, RetireReason::Configured);
        assert_eq!(report.retirements[0].attempts, 1);
        assert!(poller.is_empty());
    }

    #[tokio::test]
    async fn test_unchanging_instance_retires_after_exactly_ttl_fetches() {
        let source = ScriptedSource::default();
        let mut poller = poller_with(7, &["ns-1"]);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(source.visits("ns-1"), 7);
        assert_eq!(report.retirements[0].reason, RetireReason::Exhausted);
        assert_eq!(report.retirements[0].attempts, 7);
    }

    #[tokio::test]
    async fn test_round_robin_visit_order() {
        let source = ScriptedSource::default();
        let ids = ["a", "b", "c", "d"];
        let mut poller = poller_with(3, &ids);

        poller.drain(&source).await.unwrap();

        let calls = source.calls();
        assert_eq!(calls.len(), 12);
        for (n, call) in calls.iter().enumerate() {
            assert_eq!(call, ids[n % ids.len()], "call {} out of order", n);
        }
    }

    #[tokio::test]
    async fn test_three_instances_one_configured_on_second_visit() {
        let source = ScriptedSource::default().with("ns-2", vec![pending(), configured()]);
        let mut poller = poller_with(2, &["ns-1", "ns-2", "ns-3"]);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(report.fetches, 6);
        assert_eq!(source.visits("ns-1"), 2);
        assert_eq!(source.visits("ns-2"), 2);
        assert_eq!(source.visits("ns-3"), 2);
        assert_eq!(report.count(RetireReason::Configured), 1);
        assert_eq!(report.count(RetireReason::Exhausted), 2);
        assert!(poller.is_empty());
    }

    #[tokio::test]
    async fn test_every_instance_retired_exactly_once() {
        let source = ScriptedSource::default()
            .with("ns-1", vec![pending(), Some(NsStatus::new("failed", "init"))])
            .with("ns-2", vec![Some(NsStatus::new("terminating", "init"))])
            .with("ns-3", vec![pending(), pending(), configured()]);
        let ids = ["ns-1", "ns-2", "ns-3", "ns-4", "ns-5"];
        let ttl = 4;
        let mut poller = poller_with(ttl, &ids);

        let report = poller.drain(&source).await.unwrap();

        let mut retired: Vec<&str> = report
            .retirements
            .iter()
            .map(|r| r.instance_id.as_str())
            .collect();
        retired.sort();
        assert_eq!(retired, ids.to_vec());
        assert!(report.fetches <= (ids.len() as u64) * ttl as u64);

        let reason_of = |id: &str| {
            report
                .retirements
                .iter()
                .find(|r| r.instance_id == id)
                .map(|r| r.reason)
        };
        assert_eq!(reason_of("ns-1"), Some(RetireReason::Failed));
        assert_eq!(reason_of("ns-2"), Some(RetireReason::Terminating));
        assert_eq!(reason_of("ns-3"), Some(RetireReason::Configured));
        assert_eq!(reason_of("ns-4"), Some(RetireReason::Exhausted));
    }

    #[tokio::test]
    async fn test_fetch_bound_holds_for_many_sizes() {
        for n in 0..6usize {
            for ttl in 1..4u32 {
                let source = ScriptedSource::default();
                let ids: Vec<String> = (0..n).map(|i| format!("ns-{}", i)).collect();
                let mut poller = LifecyclePoller::new(ttl);
                for id in &ids {
                    poller.enqueue(id.clone());
                }

                let report = poller.drain(&source).await.unwrap();

                assert_eq!(report.fetches, (n as u64) * ttl as u64);
                assert_eq!(report.retirements.len(), n);
                assert!(poller.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_counts_against_budget_by_default() {
        let source = ScriptedSource::default()
            .with("ns-1", vec![None])
            .with("ns-2", vec![None, configured()]);
        let mut poller = poller_with(3, &["ns-1", "ns-2"]);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(source.visits("ns-1"), 3);
        assert_eq!(source.visits("ns-2"), 2);
        let first = &report.retirements[1];
        assert_eq!(first.instance_id, "ns-1");
        assert_eq!(first.reason, RetireReason::Unreachable);
        assert!(first.last_status.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_aborts_when_configured() {
        let source = ScriptedSource::default().with("ns-2", vec![None]);
        let mut poller =
            poller_with(3, &["ns-1", "ns-2"]).with_unreachable_policy(UnreachablePolicy::Abort);

        let err = poller.drain(&source).await.unwrap_err();

        match err {
            EvalError::InstanceUnreachable { instance_id, .. } => assert_eq!(instance_id, "ns-2"),
            other => panic!("unexpected error: {other}"),
        }
        let front: Vec<&str> = poller.pending().map(|e| e.instance_id.as_str()).collect();
        assert_eq!(front, vec!["ns-2", "ns-1"]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_keeps_pending_set() {
        let source = ScriptedSource::default();
        let (tx, rx) = watch::channel(false);
        let mut poller = poller_with(5, &["ns-1", "ns-2"]).with_shutdown(rx);
        tx.send_replace(true);

        let err = poller.drain(&source).await.unwrap_err();

        assert!(matches!(err, EvalError::Cancelled));
        assert!(source.calls().is_empty());
        let remaining: Vec<u32> = poller.pending().map(|e| e.remaining).collect();
        assert_eq!(remaining, vec![5, 5]);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_does_not_cancel() {
        let source = ScriptedSource::default().with("ns-1", vec![configured()]);
        let (tx, rx) = watch::channel(false);
        let mut poller = poller_with(2, &["ns-1"]).with_shutdown(rx);
        drop(tx);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(report.count(RetireReason::Configured), 1);
    }

    #[tokio::test]
    async fn test_interrupted_drain_keeps_partial_report() {
        let source = ScriptedSource::default()
            .with("ns-1", vec![configured()])
            .with("ns-2", vec![None]);
        let mut poller =
            poller_with(3, &["ns-1", "ns-2"]).with_unreachable_policy(UnreachablePolicy::Abort);

        assert!(poller.drain(&source).await.is_err());

        let partial = poller.partial_report();
        assert_eq!(partial.fetches, 2);
        assert_eq!(partial.retirements.len(), 1);
        assert_eq!(partial.retirements[0].instance_id, "ns-1");

        let partial = poller.take_partial_report();
        assert_eq!(partial.count(RetireReason::Configured), 1);
        assert_eq!(poller.partial_report().fetches, 0);
    }

    #[tokio::test]
    async fn test_resumed_drain_returns_combined_report() {
        let source = ScriptedSource::default()
            .with("ns-1", vec![configured()])
            .with("ns-2", vec![None, configured()]);
        let mut poller =
            poller_with(3, &["ns-1", "ns-2"]).with_unreachable_policy(UnreachablePolicy::Abort);

        assert!(poller.drain(&source).await.is_err());
        let report = poller.drain(&source).await.unwrap();

        assert_eq!(report.fetches, 3);
        assert_eq!(report.count(RetireReason::Configured), 2);
        assert!(poller.partial_report().retirements.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_still_polls_once() {
        let source = ScriptedSource::default();
        let mut poller = poller_with(0, &["ns-1"]);

        let report = poller.drain(&source).await.unwrap();

        assert_eq!(report.fetches, 1);
        assert_eq!(report.retirements[0].reason, RetireReason::Exhausted);
    }
}
