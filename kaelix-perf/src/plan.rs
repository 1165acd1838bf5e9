//! Materialised workload plans.
//!
//! Planning turns a [`TestProfile`] into one [`WorkloadPlan`] per instance,
//! with merged settings and a resolved topic. Every configuration problem
//! surfaces here, before any client is created.

use crate::config::Settings;
use crate::error::{PerfError, Result};
use crate::profile::{
    ConsumerDefinition, GroupDefinition, KeyAllocation, ProducerDefinition, TestProfile,
    WorkloadDefinition,
};
use crate::topic::ResolvedTopic;
use kaelix_core::{ClientConfig, ClientRole, Connector};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Kind of workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    /// Publishes messages
    Producer,
    /// Polls messages
    Consumer,
}

impl WorkloadKind {
    /// Client role for this kind.
    #[must_use]
    pub const fn role(self) -> ClientRole {
        match self {
            Self::Producer => ClientRole::Producer,
            Self::Consumer => ClientRole::Consumer,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.role(), f)
    }
}

/// Producer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerParams {
    /// Payload size in bytes
    pub message_size: usize,
    /// Messages to send
    pub messages_to_send: u64,
    /// Await each delivery before the next send
    pub send_blocking: bool,
    /// Pause between sends
    pub send_delay: Option<Duration>,
    /// Key assignment
    pub key_allocation: Option<KeyAllocation>,
}

/// Consumer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerParams {
    /// Messages to receive
    pub messages_to_receive: u64,
    /// Longest single poll
    pub poll_timeout: Duration,
    /// Pause after each non-empty poll
    pub receive_delay: Option<Duration>,
    /// Progress log interval, in messages
    pub report_every: Option<u64>,
}

/// Kind-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadParams {
    /// Producer workload
    Producer(ProducerParams),
    /// Consumer workload
    Consumer(ConsumerParams),
}

/// A fully resolved workload instance.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadPlan {
    /// Instance id, unique within the profile
    pub id: String,
    /// Effective client settings
    pub settings: Settings,
    /// Effective topic
    pub topic: ResolvedTopic,
    /// Kind-specific parameters
    pub params: WorkloadParams,
}

impl WorkloadPlan {
    /// Kind of this workload.
    #[must_use]
    pub const fn kind(&self) -> WorkloadKind {
        match self.params {
            WorkloadParams::Producer(_) => WorkloadKind::Producer,
            WorkloadParams::Consumer(_) => WorkloadKind::Consumer,
        }
    }

    /// Connection request for this workload's client.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.kind().role(), self.settings.clone())
    }

    /// Number of messages this workload moves when it completes.
    #[must_use]
    pub const fn target(&self) -> u64 {
        match &self.params {
            WorkloadParams::Producer(p) => p.messages_to_send,
            WorkloadParams::Consumer(c) => c.messages_to_receive,
        }
    }
}

/// Everything the executor needs to run a profile.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Producer plans in declaration order
    pub producers: Vec<WorkloadPlan>,
    /// Consumer plans in declaration order
    pub consumers: Vec<WorkloadPlan>,
    /// Concurrency mode
    pub concurrent: bool,
    /// Duration bound of a concurrent run
    pub max_duration: Duration,
}

impl ExecutionPlan {
    /// Plan every instance of `profile`.
    ///
    /// # Errors
    /// Returns [`PerfError::Configuration`] for an invalid profile-level
    /// parameter, a duplicate instance id, an unresolvable topic, an invalid
    /// workload parameter, or a setting `connector` requires but the merged
    /// configuration lacks.
    pub fn build(profile: &TestProfile, connector: &dyn Connector) -> Result<Self> {
        profile.validate()?;

        let producers = plan_group(profile, &profile.producers, producer_params)?;
        let consumers = plan_group(profile, &profile.consumers, consumer_params)?;

        let mut seen = HashSet::new();
        for plan in producers.iter().chain(&consumers) {
            if !seen.insert(plan.id.as_str()) {
                return Err(PerfError::configuration(
                    plan.id.clone(),
                    "instance id is used more than once",
                ));
            }
            check_required_settings(plan, connector)?;
            debug!(
                instance = %plan.id,
                kind = %plan.kind(),
                topic = %plan.topic.topic,
                source = %plan.topic.source,
                settings = plan.settings.len(),
                "workload planned"
            );
        }

        Ok(Self {
            producers,
            consumers,
            concurrent: profile.concurrent,
            max_duration: profile.max_duration(),
        })
    }

    /// Total number of workloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.producers.len() + self.consumers.len()
    }

    /// Whether the profile declares no workloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All plans, producers first.
    pub fn iter(&self) -> impl Iterator<Item = &WorkloadPlan> {
        self.producers.iter().chain(&self.consumers)
    }
}

fn plan_group<W, F>(
    profile: &TestProfile,
    group: &GroupDefinition<W>,
    params: F,
) -> Result<Vec<WorkloadPlan>>
where
    W: WorkloadDefinition,
    F: Fn(&W, &str) -> Result<WorkloadParams>,
{
    group
        .chains(&profile.node)
        .enumerate()
        .map(|(index, (member, chain))| {
            let id = group.instance_id(index);
            let topic = profile.topic_resolver().resolve(&chain, &id)?;
            let params = params(member, &id)?;
            Ok(WorkloadPlan { settings: chain.effective_settings(), topic, params, id })
        })
        .collect()
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}

fn producer_params(def: &ProducerDefinition, id: &str) -> Result<WorkloadParams> {
    if let Some(keys) = def.key_allocation {
        if keys.unique_keys == 0 {
            return Err(PerfError::configuration(id, "keyAllocation.uniqueKeys must be positive"));
        }
    }
    Ok(WorkloadParams::Producer(ProducerParams {
        message_size: def.message_size,
        messages_to_send: def.messages_to_send,
        send_blocking: def.send_blocking,
        send_delay: millis(def.send_delay_ms),
        key_allocation: def.key_allocation,
    }))
}

fn consumer_params(def: &ConsumerDefinition, id: &str) -> Result<WorkloadParams> {
    if def.poll_timeout_ms == 0 {
        return Err(PerfError::configuration(id, "pollTimeoutMs must be positive"));
    }
    Ok(WorkloadParams::Consumer(ConsumerParams {
        messages_to_receive: def.messages_to_receive,
        poll_timeout: Duration::from_millis(def.poll_timeout_ms),
        receive_delay: millis(def.receive_delay_ms),
        report_every: def.report_received_every.filter(|n| *n > 0),
    }))
}

fn check_required_settings(plan: &WorkloadPlan, connector: &dyn Connector) -> Result<()> {
    let missing: Vec<&str> = connector
        .required_settings(plan.kind().role())
        .iter()
        .copied()
        .filter(|key| plan.settings.get(*key).map_or(true, serde_json::Value::is_null))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PerfError::configuration(
            plan.id.clone(),
            format!("missing required settings: {}", missing.join(", ")),
        ))
    }
}
