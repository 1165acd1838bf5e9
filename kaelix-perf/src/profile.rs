//! Test profile definitions.
//!
//! A [`TestProfile`] is the root of a test run. It owns a producer group
//! and a consumer group, and each group owns its workload definitions.
//! Profiles deserialize from documents shaped like:
//!
//! ```json
//! {
//!   "config": { "bootstrap.servers": "embedded://..." },
//!   "maxDuration": 30,
//!   "concurrent": true,
//!   "autogenerateTopic": false,
//!   "producers": {
//!     "config": { "acks": "all" },
//!     "instances": [{ "topic": "foo", "messageSize": 1024, "messagesToSend": 1000 }]
//!   },
//!   "consumers": {
//!     "config": { "group.id": "bar" },
//!     "instances": [{ "topic": "foo", "messagesToReceive": 1000 }]
//!   }
//! }
//! ```

use crate::config::{ConfigNode, LayerChain, Settings};
use crate::error::{PerfError, Result};
use crate::topic::{AutogeneratedTopic, ResolvedTopic, TopicResolver};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_DURATION_SECS: u64 = 30;
const DEFAULT_MESSAGE_SIZE: usize = 1024;
const DEFAULT_MESSAGE_COUNT: u64 = 10_000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

const fn default_max_duration() -> u64 {
    DEFAULT_MAX_DURATION_SECS
}

const fn default_true() -> bool {
    true
}

const fn default_message_size() -> usize {
    DEFAULT_MESSAGE_SIZE
}

const fn default_message_count() -> u64 {
    DEFAULT_MESSAGE_COUNT
}

const fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MS
}

/// How a producer picks message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAllocationType {
    /// Cycle through the key space in order
    Fair,
    /// Pick keys uniformly at random
    Random,
}

/// Key assignment for produced messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAllocation {
    /// Allocation strategy
    #[serde(rename = "type")]
    pub kind: KeyAllocationType,
    /// Number of distinct keys
    pub unique_keys: u32,
}

/// A producer workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerDefinition {
    /// Instance-tier settings and topic
    #[serde(flatten)]
    pub node: ConfigNode,

    /// Explicit instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Payload size of every message, in bytes
    #[serde(default = "default_message_size")]
    pub message_size: usize,

    /// Number of messages to send
    #[serde(default = "default_message_count")]
    pub messages_to_send: u64,

    /// Wait for each acknowledgement before the next send
    #[serde(default)]
    pub send_blocking: bool,

    /// Pause between sends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_delay_ms: Option<u64>,

    /// Message key assignment; messages are unkeyed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_allocation: Option<KeyAllocation>,
}

impl Default for ProducerDefinition {
    fn default() -> Self {
        Self {
            node: ConfigNode::default(),
            name: None,
            message_size: DEFAULT_MESSAGE_SIZE,
            messages_to_send: DEFAULT_MESSAGE_COUNT,
            send_blocking: false,
            send_delay_ms: None,
            key_allocation: None,
        }
    }
}

/// A consumer workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerDefinition {
    /// Instance-tier settings and topic
    #[serde(flatten)]
    pub node: ConfigNode,

    /// Explicit instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Number of messages to receive before finishing
    #[serde(default = "default_message_count")]
    pub messages_to_receive: u64,

    /// Longest wait of a single poll
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Pause after each non-empty poll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_delay_ms: Option<u64>,

    /// Log progress every this many messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_received_every: Option<u64>,
}

impl Default for ConsumerDefinition {
    fn default() -> Self {
        Self {
            node: ConfigNode::default(),
            name: None,
            messages_to_receive: DEFAULT_MESSAGE_COUNT,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            receive_delay_ms: None,
            report_received_every: None,
        }
    }
}

/// Access to the instance tier of a workload definition.
pub trait WorkloadDefinition {
    /// Prefix of generated instance ids.
    const ID_PREFIX: &'static str;

    /// Instance-tier node.
    fn node(&self) -> &ConfigNode;

    /// Explicit id, if any.
    fn name(&self) -> Option<&str>;
}

impl WorkloadDefinition for ProducerDefinition {
    const ID_PREFIX: &'static str = "producer";

    fn node(&self) -> &ConfigNode {
        &self.node
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl WorkloadDefinition for ConsumerDefinition {
    const ID_PREFIX: &'static str = "consumer";

    fn node(&self) -> &ConfigNode {
        &self.node
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A group of workloads of one kind sharing group-tier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition<W> {
    /// Group-tier settings and topic
    #[serde(flatten)]
    pub node: ConfigNode,

    /// Members, in declaration order
    #[serde(default = "Vec::new")]
    pub instances: Vec<W>,
}

/// The producer group.
pub type ProducersDefinition = GroupDefinition<ProducerDefinition>;

/// The consumer group.
pub type ConsumersDefinition = GroupDefinition<ConsumerDefinition>;

impl<W> Default for GroupDefinition<W> {
    fn default() -> Self {
        Self { node: ConfigNode::default(), instances: Vec::new() }
    }
}

impl<W: WorkloadDefinition> GroupDefinition<W> {
    /// Group with the given members and no group-tier settings.
    #[must_use]
    pub fn with_instances(instances: Vec<W>) -> Self {
        Self { node: ConfigNode::default(), instances }
    }

    /// Instance id of the member at `index`.
    #[must_use]
    pub fn instance_id(&self, index: usize) -> String {
        self.instances
            .get(index)
            .and_then(|member| member.name())
            .map_or_else(|| format!("{}-{index}", W::ID_PREFIX), str::to_string)
    }

    /// Layer chain of every member under `profile`.
    pub fn chains<'a>(
        &'a self,
        profile: &'a ConfigNode,
    ) -> impl Iterator<Item = (&'a W, LayerChain<'a>)> + 'a {
        self.instances
            .iter()
            .map(move |member| (member, LayerChain::new(profile, &self.node, member.node())))
    }

    /// Effective settings of every member under `profile`.
    pub fn merged_settings<'a>(
        &'a self,
        profile: &'a ConfigNode,
    ) -> impl Iterator<Item = (&'a W, Settings)> + 'a {
        self.chains(profile).map(|(member, chain)| (member, chain.effective_settings()))
    }
}

/// Root of a test run.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProfile {
    /// Profile-tier settings and topic
    #[serde(flatten)]
    pub node: ConfigNode,

    /// Upper bound on a concurrent run, in seconds
    #[serde(default = "default_max_duration", rename = "maxDuration")]
    pub max_duration_seconds: u64,

    /// Run producers and consumers together; otherwise producers finish first
    #[serde(default = "default_true")]
    pub concurrent: bool,

    /// Use one generated topic for every workload, ignoring declared topics
    #[serde(default)]
    pub autogenerate_topic: bool,

    /// Producer group
    #[serde(default)]
    pub producers: ProducersDefinition,

    /// Consumer group
    #[serde(default)]
    pub consumers: ConsumersDefinition,

    #[serde(skip)]
    autogenerated_topic: AutogeneratedTopic,
}

impl Default for TestProfile {
    fn default() -> Self {
        Self {
            node: ConfigNode::default(),
            max_duration_seconds: DEFAULT_MAX_DURATION_SECS,
            concurrent: true,
            autogenerate_topic: false,
            producers: ProducersDefinition::default(),
            consumers: ConsumersDefinition::default(),
            autogenerated_topic: AutogeneratedTopic::default(),
        }
    }
}

impl TestProfile {
    /// Parse a JSON profile document.
    ///
    /// # Errors
    /// Returns [`PerfError::ProfileParse`] for malformed documents.
    pub fn from_json_str(document: &str) -> Result<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// Parse a TOML profile document.
    ///
    /// # Errors
    /// Returns [`PerfError::ProfileParse`] for malformed documents.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }

    /// Duration bound of a concurrent run.
    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_seconds)
    }

    /// Resolver implementing this profile's topic policy.
    #[must_use]
    pub fn topic_resolver(&self) -> TopicResolver<'_> {
        if self.autogenerate_topic {
            TopicResolver::autogenerated(&self.autogenerated_topic)
        } else {
            TopicResolver::declared()
        }
    }

    /// Resolve the topic of a workload in one of this profile's groups.
    ///
    /// # Errors
    /// See [`TopicResolver::resolve`].
    pub fn resolve_topic<W: WorkloadDefinition>(
        &self,
        group: &GroupDefinition<W>,
        member: &W,
        instance: &str,
    ) -> Result<ResolvedTopic> {
        let chain = LayerChain::new(&self.node, &group.node, member.node());
        self.topic_resolver().resolve(&chain, instance)
    }

    /// Check the profile-level parameters.
    ///
    /// # Errors
    /// Returns [`PerfError::Configuration`] if a concurrent run has no time
    /// to run in.
    pub fn validate(&self) -> Result<()> {
        if self.concurrent && self.max_duration_seconds == 0 {
            return Err(PerfError::configuration(
                "profile",
                "maxDuration must be at least 1 second for concurrent runs",
            ));
        }
        Ok(())
    }
}
