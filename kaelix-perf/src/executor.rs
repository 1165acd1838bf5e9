//! Test profile execution.
//!
//! The executor plans every workload up front, then runs the drivers either
//! one after another or all at once under a duration bound, and folds their
//! reports into a [`TestReport`].
//!
//! ```text
//! Idle -> Starting -> Running -> Completed | TimedOut | Failed -> Finished
//! ```

use crate::completion::{completion_channel, Completion, CompletionReceiver};
use crate::driver::{self, DriverReport, WorkloadDriver};
use crate::error::{PerfError, Result};
use crate::harness::HarnessConfig;
use crate::plan::ExecutionPlan;
use crate::profile::TestProfile;
use crate::report::{InstanceReport, InstanceStatus, TerminalState, TestReport};
use crate::stop::{stop_channel, StopHandle};
use kaelix_core::Connector;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Not yet started
    Idle,
    /// Planning and validating
    Starting,
    /// Drivers are running
    Running,
    /// Every driver reached its target
    Completed,
    /// The duration bound expired
    TimedOut,
    /// A driver failed, or planning failed
    Failed,
    /// Report produced
    Finished,
}

impl RunState {
    /// Whether moving to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Starting)
                | (Self::Starting, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::TimedOut | Self::Failed)
                | (Self::Completed | Self::TimedOut | Self::Failed, Self::Finished)
        )
    }

    /// Terminal state this run state stands for, if any.
    #[must_use]
    pub const fn terminal(self) -> Option<TerminalState> {
        match self {
            Self::Completed => Some(TerminalState::Completed),
            Self::TimedOut => Some(TerminalState::TimedOut),
            Self::Failed => Some(TerminalState::Failed),
            _ => None,
        }
    }
}

impl From<TerminalState> for RunState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Completed => Self::Completed,
            TerminalState::TimedOut => Self::TimedOut,
            TerminalState::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Runs a [`TestProfile`] against a [`Connector`].
pub struct TestProfileExecutor {
    profile: TestProfile,
    connector: Arc<dyn Connector>,
    harness: HarnessConfig,
    state: Mutex<RunState>,
}

impl fmt::Debug for TestProfileExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestProfileExecutor")
            .field("connector", &self.connector)
            .field("harness", &self.harness)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A driver together with the slot its report goes into.
struct Slot {
    driver: Arc<dyn WorkloadDriver>,
    report: Option<InstanceReport>,
}

impl Slot {
    fn record(&mut self, report: &DriverReport, origin: Instant) {
        self.report = Some(InstanceReport::from_driver(self.driver.as_ref(), report, origin));
    }

    fn finish(self, missing: InstanceStatus) -> InstanceReport {
        self.report.unwrap_or_else(|| InstanceReport::unfinished(self.driver.as_ref(), missing))
    }
}

impl TestProfileExecutor {
    /// Executor with default harness settings.
    #[must_use]
    pub fn new(profile: TestProfile, connector: Arc<dyn Connector>) -> Self {
        Self {
            profile,
            connector,
            harness: HarnessConfig::default(),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Replace the harness settings.
    #[must_use]
    pub fn with_harness_config(mut self, harness: HarnessConfig) -> Self {
        self.harness = harness;
        self
    }

    /// The profile being executed.
    #[must_use]
    pub const fn profile(&self) -> &TestProfile {
        &self.profile
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    fn transition(&self, next: RunState) {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            debug!(from = %*state, to = %next, "run state change");
            *state = next;
        } else {
            debug_assert!(false, "illegal run state transition {} -> {next}", *state);
            error!(from = %*state, to = %next, "ignoring illegal run state transition");
        }
    }

    /// Execute the profile.
    ///
    /// Workload failures and timeouts are not errors: they are reported
    /// through [`TestReport::state`], with whatever counts the drivers
    /// reached.
    ///
    /// # Errors
    /// Returns [`PerfError::Configuration`] if the profile cannot be
    /// planned, or if this executor has already run. No driver is started
    /// in either case.
    pub async fn run(&self) -> Result<TestReport> {
        {
            let mut state = self.state.lock();
            if *state != RunState::Idle {
                return Err(PerfError::configuration("profile", "executor has already run"));
            }
            *state = RunState::Starting;
        }

        let plan = match ExecutionPlan::build(&self.profile, self.connector.as_ref()) {
            Ok(plan) => plan,
            Err(err) => {
                error!(error = %err, "profile rejected");
                self.transition(RunState::Failed);
                self.transition(RunState::Finished);
                return Err(err);
            }
        };

        info!(
            producers = plan.producers.len(),
            consumers = plan.consumers.len(),
            concurrent = plan.concurrent,
            max_duration_secs = plan.max_duration.as_secs(),
            "starting test run"
        );

        let concurrent = plan.concurrent;
        let max_duration = plan.max_duration;
        let slots: Vec<Slot> = plan
            .producers
            .into_iter()
            .chain(plan.consumers)
            .map(|plan| Slot {
                driver: driver::from_plan(plan, Arc::clone(&self.connector)),
                report: None,
            })
            .collect();

        let origin = Instant::now();
        self.transition(RunState::Running);

        let (state, instances) = if concurrent {
            self.run_concurrent(slots, origin, max_duration).await
        } else {
            Self::run_sequential(slots, origin).await
        };

        self.transition(state.into());
        let report = TestReport { state, instances, elapsed: origin.elapsed() };
        self.transition(RunState::Finished);

        info!(
            state = %report.state,
            sent = report.total_sent(),
            received = report.total_received(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "test run finished"
        );
        Ok(report)
    }

    /// Producers in order, then consumers in order. A failure ends the run;
    /// workloads after the failed one never start.
    async fn run_sequential(
        slots: Vec<Slot>,
        origin: Instant,
    ) -> (TerminalState, Vec<InstanceReport>) {
        let (_handle, stop) = stop_channel();
        let mut state = TerminalState::Completed;
        let mut instances = Vec::with_capacity(slots.len());

        for mut slot in slots {
            if state == TerminalState::Failed {
                instances.push(slot.finish(InstanceStatus::NotStarted));
                continue;
            }

            let report = slot.driver.run(stop.clone()).await;
            if report.outcome.is_failure() {
                warn!(instance = %report.id, "workload failed, skipping the rest of the run");
                state = TerminalState::Failed;
            }
            slot.record(&report, origin);
            instances.push(slot.finish(InstanceStatus::NotStarted));
        }

        (state, instances)
    }

    /// Every driver on its own task, bounded by `max_duration`.
    async fn run_concurrent(
        &self,
        mut slots: Vec<Slot>,
        origin: Instant,
        max_duration: Duration,
    ) -> (TerminalState, Vec<InstanceReport>) {
        let (handle, stop) = stop_channel();
        let (senders, mut completions) = completion_channel::<DriverReport>(slots.len());
        let mut tasks = JoinSet::new();

        for (slot, sender) in slots.iter().zip(senders) {
            let driver = Arc::clone(&slot.driver);
            let stop = stop.clone();
            tasks.spawn(async move {
                let report = driver.run(stop).await;
                sender.signal(report);
            });
        }

        let deadline = tokio::time::sleep(max_duration);
        tokio::pin!(deadline);

        let state = loop {
            if completions.is_complete() {
                break TerminalState::Completed;
            }

            tokio::select! {
                completion = completions.recv() => {
                    let Some(Completion { index, value: report }) = completion else {
                        error!("a workload ended without reporting");
                        break TerminalState::Failed;
                    };
                    slots[index].record(&report, origin);
                    if report.outcome.is_failure() {
                        error!(instance = %report.id, "workload failed, stopping the run");
                        break TerminalState::Failed;
                    }
                }
                Some(Err(err)) = tasks.join_next() => {
                    if err.is_panic() {
                        error!(error = %err, "workload task panicked, stopping the run");
                        break TerminalState::Failed;
                    }
                }
                () = &mut deadline => {
                    warn!(
                        max_duration_secs = max_duration.as_secs(),
                        outstanding = completions.outstanding(),
                        "duration bound reached, stopping the run"
                    );
                    break TerminalState::TimedOut;
                }
            }
        };

        match state {
            TerminalState::Completed => {}
            TerminalState::TimedOut => {
                self.wind_down(&handle, &mut slots, &mut completions, origin).await;
            }
            TerminalState::Failed => {
                handle.stop();
                while let Some(Completion { index, value: report }) = completions.try_recv() {
                    slots[index].record(&report, origin);
                }
                debug!(unreported = completions.outstanding(), "aborting remaining workloads");
            }
        }
        tasks.abort_all();

        let instances =
            slots.into_iter().map(|slot| slot.finish(InstanceStatus::Aborted)).collect();
        (state, instances)
    }

    /// Broadcast a stop and collect reports until every driver has signalled
    /// or the shutdown grace runs out. Used after a timeout only; a failed
    /// run does not wait for the remaining drivers.
    async fn wind_down(
        &self,
        handle: &StopHandle,
        slots: &mut [Slot],
        completions: &mut CompletionReceiver<DriverReport>,
        origin: Instant,
    ) {
        handle.stop();
        let grace = self.harness.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while let Some(Completion { index, value: report }) = completions.recv().await {
                slots[index].record(&report, origin);
            }
        })
        .await;

        if drained.is_err() || !completions.is_complete() {
            warn!(
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                unreported = completions.outstanding(),
                "workloads did not stop in time and will be aborted"
            );
        }
    }
}
