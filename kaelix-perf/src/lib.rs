//! # Kaelix Perf
//!
//! Profile-driven load testing for Kaelix-compatible brokers.
//!
//! A [`TestProfile`] declares producer and consumer workloads with settings
//! at three tiers (profile, group and instance). The executor merges those
//! settings, resolves each workload's topic, runs the workloads one after
//! another or all at once under a duration bound, and returns a
//! [`TestReport`] with per-instance counts.
//!
//! This crate provides:
//! - Right-biased settings merge across the profile, group and instance tiers
//! - Topic resolution, including a per-profile autogenerated topic
//! - Producer and consumer drivers over the [`kaelix_core::Connector`] seam
//! - Sequential and concurrent execution with cooperative cancellation
//! - Human and JSON report rendering
//!
//! ## Examples
//!
//! ```rust,no_run
//! use kaelix_perf::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(connector: Arc<dyn Connector>) -> kaelix_perf::Result<()> {
//! let profile = TestProfile::from_json_str(r#"{
//!     "config": { "bootstrap.servers": "embedded://local" },
//!     "topic": "foo",
//!     "producers": { "instances": [{ "messagesToSend": 1000 }] },
//!     "consumers": {
//!         "config": { "group.id": "bar" },
//!         "instances": [{ "messagesToReceive": 1000 }]
//!     }
//! }"#)?;
//!
//! let report = TestProfileExecutor::new(profile, connector).run().await?;
//! print!("{}", HumanReporter.render_to_string(&report));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod completion;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod harness;
pub mod plan;
pub mod profile;
pub mod report;
pub mod stop;
pub mod telemetry;
pub mod topic;

pub use crate::{
    config::{merge, ConfigNode, LayerChain, Settings, Tier},
    driver::{ConsumerDriver, DriverOutcome, DriverReport, ProducerDriver, WorkloadDriver},
    error::{PerfError, Result},
    executor::{RunState, TestProfileExecutor},
    harness::HarnessConfig,
    plan::{ExecutionPlan, WorkloadKind, WorkloadPlan},
    profile::{
        ConsumerDefinition, ConsumersDefinition, GroupDefinition, ProducerDefinition,
        ProducersDefinition, TestProfile,
    },
    report::{InstanceReport, InstanceStatus, TerminalState, TestReport},
    topic::{AutogeneratedTopic, ResolvedTopic, TopicResolver, TopicSource},
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::report::{HumanReporter, JsonReporter, ReportFormat, Reporter};
    pub use crate::stop::{stop_channel, StopHandle, StopSignal};
    pub use crate::{
        ConfigNode, ConsumerDefinition, ConsumersDefinition, HarnessConfig, InstanceStatus,
        PerfError, ProducerDefinition, ProducersDefinition, Result, RunState, TerminalState,
        TestProfile, TestProfileExecutor, TestReport, WorkloadDriver, WorkloadKind,
    };
    pub use kaelix_core::{ClientRole, ClientSettings, Connector};
}
