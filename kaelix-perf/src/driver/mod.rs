//! Workload drivers.
//!
//! A driver owns one client for the duration of [`WorkloadDriver::run`]
//! and moves messages until its target is met, a stop is requested, or the
//! client fails. Progress is published through a shared counter so the
//! executor can report partial counts for drivers it had to abandon.

pub mod consumer;
pub mod producer;

pub use consumer::ConsumerDriver;
pub use producer::{KeyAllocator, ProducerDriver};

use crate::error::PerfError;
use crate::plan::{WorkloadKind, WorkloadParams, WorkloadPlan};
use crate::stop::StopSignal;
use async_trait::async_trait;
use kaelix_core::{Client, Connector, Topic};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::warn;

/// Messages moved by one driver, shared with observers.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU64>);

impl Progress {
    /// Record `n` more messages.
    pub fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Current count.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a driver run ended.
#[derive(Debug, Clone)]
pub enum DriverOutcome {
    /// Target reached
    Completed,
    /// Stop observed before the target was reached
    Stopped,
    /// Client error
    Failed(PerfError),
}

impl DriverOutcome {
    /// Whether the run failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of one driver run.
#[derive(Debug, Clone)]
pub struct DriverReport {
    /// Instance id
    pub id: String,
    /// Workload kind
    pub kind: WorkloadKind,
    /// Messages sent or received
    pub transferred: u64,
    /// When the run began
    pub started_at: Instant,
    /// When the run ended
    pub finished_at: Instant,
    /// How it ended
    pub outcome: DriverOutcome,
}

/// A workload that can be run against a connector.
#[async_trait]
pub trait WorkloadDriver: Send + Sync {
    /// Instance id.
    fn id(&self) -> &str;

    /// Workload kind.
    fn kind(&self) -> WorkloadKind;

    /// Topic the workload uses.
    fn topic(&self) -> &Topic;

    /// Shared progress counter.
    fn progress(&self) -> &Progress;

    /// Messages to move before the run counts as complete.
    fn target(&self) -> u64;

    /// Messages sent or received so far.
    fn messages_transferred(&self) -> u64 {
        self.progress().get()
    }

    /// Whether the target has been reached.
    fn is_complete(&self) -> bool {
        self.messages_transferred() >= self.target()
    }

    /// Run to completion, stop, or failure. Never panics on client errors;
    /// they end up in [`DriverReport::outcome`].
    async fn run(&self, stop: StopSignal) -> DriverReport;
}

/// Build the driver for `plan`.
#[must_use]
pub fn from_plan(plan: WorkloadPlan, connector: Arc<dyn Connector>) -> Arc<dyn WorkloadDriver> {
    let config = plan.client_config();
    let topic = plan.topic.topic;
    match plan.params {
        WorkloadParams::Producer(params) => {
            Arc::new(ProducerDriver::new(plan.id, topic, config, params, connector))
        }
        WorkloadParams::Consumer(params) => {
            Arc::new(ConsumerDriver::new(plan.id, topic, config, params, connector))
        }
    }
}

/// Release `client`, logging instead of failing.
async fn close_quietly(id: &str, client: Box<dyn Client>) {
    if let Err(err) = client.close().await {
        warn!(instance = id, error = %err, "client did not close cleanly");
    }
}

/// Report for a run that began at `started_at`. `Ok(true)` means the
/// target was reached, `Ok(false)` that a stop cut the run short.
fn finish<D>(driver: &D, started_at: Instant, result: kaelix_core::Result<bool>) -> DriverReport
where
    D: WorkloadDriver + ?Sized,
{
    let outcome = match result {
        Ok(true) => DriverOutcome::Completed,
        Ok(false) => DriverOutcome::Stopped,
        Err(err) => DriverOutcome::Failed(PerfError::workload(driver.id(), err)),
    };
    DriverReport {
        id: driver.id().to_string(),
        kind: driver.kind(),
        transferred: driver.messages_transferred(),
        started_at,
        finished_at: Instant::now(),
        outcome,
    }
}
