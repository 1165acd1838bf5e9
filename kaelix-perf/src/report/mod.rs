//! Run reports and their renderings.

mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonReporter};

use crate::driver::{DriverOutcome, DriverReport, WorkloadDriver};
use crate::plan::WorkloadKind;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalState {
    /// Every workload reached its target
    Completed,
    /// The duration bound expired first
    TimedOut,
    /// A workload failed
    Failed,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// How one workload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    /// Target reached
    Completed,
    /// Stopped early on request
    Stopped,
    /// Client error
    Failed,
    /// Never ran
    NotStarted,
    /// Did not stop within the shutdown grace and was cancelled
    Aborted,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::NotStarted => "not started",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn opt_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => millis(d, s),
        None => s.serialize_none(),
    }
}

/// Outcome of one workload instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceReport {
    /// Instance id
    pub id: String,
    /// Workload kind
    pub kind: WorkloadKind,
    /// Topic used
    pub topic: String,
    /// Acknowledged sends, producers only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<u64>,
    /// Received messages, consumers only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<u64>,
    /// Final status
    pub status: InstanceStatus,
    /// Start, relative to the start of the run
    #[serde(rename = "startedMs", serialize_with = "opt_millis")]
    pub started: Option<Duration>,
    /// End, relative to the start of the run
    #[serde(rename = "finishedMs", serialize_with = "opt_millis")]
    pub finished: Option<Duration>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstanceReport {
    fn base(driver: &dyn WorkloadDriver, transferred: u64, status: InstanceStatus) -> Self {
        let (sent, received) = match driver.kind() {
            WorkloadKind::Producer => (Some(transferred), None),
            WorkloadKind::Consumer => (None, Some(transferred)),
        };
        Self {
            id: driver.id().to_string(),
            kind: driver.kind(),
            topic: driver.topic().to_string(),
            sent,
            received,
            status,
            started: None,
            finished: None,
            error: None,
        }
    }

    /// Report for a driver that returned `report`. Offsets are measured
    /// from `origin`.
    #[must_use]
    pub fn from_driver(
        driver: &dyn WorkloadDriver,
        report: &DriverReport,
        origin: Instant,
    ) -> Self {
        let (status, error) = match &report.outcome {
            DriverOutcome::Completed => (InstanceStatus::Completed, None),
            DriverOutcome::Stopped => (InstanceStatus::Stopped, None),
            DriverOutcome::Failed(err) => (InstanceStatus::Failed, Some(err.to_string())),
        };
        Self {
            started: Some(report.started_at.saturating_duration_since(origin)),
            finished: Some(report.finished_at.saturating_duration_since(origin)),
            error,
            ..Self::base(driver, report.transferred, status)
        }
    }

    /// Report for a driver that never returned, built from its live
    /// progress counter.
    #[must_use]
    pub fn unfinished(driver: &dyn WorkloadDriver, status: InstanceStatus) -> Self {
        Self::base(driver, driver.messages_transferred(), status)
    }

    /// Messages sent or received.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.sent.or(self.received).unwrap_or(0)
    }
}

/// Aggregated result of a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Terminal state
    pub state: TerminalState,
    /// One entry per workload, producers first, in declaration order
    pub instances: Vec<InstanceReport>,
    /// Wall-clock time of the run
    #[serde(rename = "elapsedMs", serialize_with = "millis")]
    pub elapsed: Duration,
}

impl TestReport {
    /// Entry for instance `id`.
    #[must_use]
    pub fn instance(&self, id: &str) -> Option<&InstanceReport> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Total acknowledged sends.
    #[must_use]
    pub fn total_sent(&self) -> u64 {
        self.instances.iter().filter_map(|i| i.sent).sum()
    }

    /// Total received messages.
    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.instances.iter().filter_map(|i| i.received).sum()
    }

    /// Whether the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == TerminalState::Completed
    }
}

/// Output format of a [`Reporter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text table
    #[default]
    Human,
    /// One JSON document per report
    Json,
}

impl ReportFormat {
    /// Reporter for this format.
    #[must_use]
    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            Self::Human => Box::new(HumanReporter),
            Self::Json => Box::new(JsonReporter::default()),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

/// Renders a [`TestReport`].
pub trait Reporter: Send + Sync {
    /// Write `report` to `out`.
    ///
    /// # Errors
    /// Propagates write failures.
    fn render(&self, report: &TestReport, out: &mut dyn io::Write) -> io::Result<()>;

    /// Render into a string.
    fn render_to_string(&self, report: &TestReport) -> String {
        let mut buf = Vec::new();
        // writes to a Vec cannot fail
        let _ = self.render(report, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
pub(crate) fn sample_report() -> TestReport {
    TestReport {
        state: TerminalState::TimedOut,
        instances: vec![
            InstanceReport {
                id: "producer-0".into(),
                kind: WorkloadKind::Producer,
                topic: "foo".into(),
                sent: Some(1000),
                received: None,
                status: InstanceStatus::Completed,
                started: Some(Duration::from_millis(1)),
                finished: Some(Duration::from_millis(250)),
                error: None,
            },
            InstanceReport {
                id: "consumer-0".into(),
                kind: WorkloadKind::Consumer,
                topic: "foo".into(),
                sent: None,
                received: Some(420),
                status: InstanceStatus::Aborted,
                started: None,
                finished: None,
                error: None,
            },
        ],
        elapsed: Duration::from_millis(1500),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_by_kind() {
        let report = sample_report();
        assert_eq!(report.total_sent(), 1000);
        assert_eq!(report.total_received(), 420);
        assert_eq!(report.instance("consumer-0").map(InstanceReport::transferred), Some(420));
        assert!(report.instance("consumer-9").is_none());
        assert!(!report.is_completed());
    }

    #[test]
    fn report_format_parses() {
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert_eq!(" human ".parse::<ReportFormat>(), Ok(ReportFormat::Human));
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
