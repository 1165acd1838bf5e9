//! Topic naming policy.
//!
//! A profile either names its topics explicitly, at any tier, or asks for an
//! autogenerated topic. The autogenerated name is fixed the first time it is
//! asked for and shared by every workload in the profile from then on.

use crate::config::{LayerChain, Tier};
use crate::error::{PerfError, Result};
use chrono::{Local, NaiveDateTime};
use kaelix_core::Topic;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::fmt;

/// Prefix of autogenerated topic names.
pub const AUTOGENERATED_TOPIC_PREFIX: &str = "kafka-perf-test_";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Build the autogenerated topic name for `at`.
///
/// # Errors
/// Never fails for the built-in prefix; the error path exists because topic
/// names are validated on construction.
pub fn autogenerated_name(at: NaiveDateTime) -> Result<Topic> {
    let name = format!("{AUTOGENERATED_TOPIC_PREFIX}{}", at.format(TIMESTAMP_FORMAT));
    Topic::new(name).map_err(|e| PerfError::configuration("profile", e.to_string()))
}

/// State of an [`AutogeneratedTopic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCell {
    /// No workload has asked for the topic yet
    Unresolved,
    /// The topic every later request receives
    Resolved(Topic),
}

/// Compute-once holder for a profile's autogenerated topic.
///
/// Concurrent first requests are serialised through an upgradable read, so
/// exactly one of them writes the cell.
#[derive(Debug)]
pub struct AutogeneratedTopic {
    cell: RwLock<TopicCell>,
}

impl Default for AutogeneratedTopic {
    fn default() -> Self {
        Self { cell: RwLock::new(TopicCell::Unresolved) }
    }
}

impl AutogeneratedTopic {
    /// The topic, computing it from the local wall clock on first use.
    ///
    /// # Errors
    /// See [`autogenerated_name`].
    pub fn get_or_resolve(&self) -> Result<Topic> {
        self.get_or_resolve_with(|| Local::now().naive_local())
    }

    /// The topic, computing it from `now` on first use. `now` is not called
    /// once the cell is resolved.
    ///
    /// # Errors
    /// See [`autogenerated_name`].
    pub fn get_or_resolve_with<F>(&self, now: F) -> Result<Topic>
    where
        F: FnOnce() -> NaiveDateTime,
    {
        let cell = self.cell.upgradable_read();
        if let TopicCell::Resolved(topic) = &*cell {
            return Ok(topic.clone());
        }

        let topic = autogenerated_name(now())?;
        let mut cell = RwLockUpgradableReadGuard::upgrade(cell);
        *cell = TopicCell::Resolved(topic.clone());
        tracing::info!(%topic, "autogenerated topic resolved");
        Ok(topic)
    }

    /// Current state without resolving.
    #[must_use]
    pub fn state(&self) -> TopicCell {
        self.cell.read().clone()
    }
}

/// Where a resolved topic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicSource {
    /// The profile's autogenerated topic
    Autogenerated,
    /// Declared explicitly at the given tier
    Declared(Tier),
}

impl fmt::Display for TopicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Autogenerated => f.write_str("autogenerated"),
            Self::Declared(tier) => write!(f, "{tier} config"),
        }
    }
}

/// A topic plus the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    /// The topic to use
    pub topic: Topic,
    /// Where it came from
    pub source: TopicSource,
}

/// Resolves the effective topic of workload instances.
#[derive(Debug, Clone, Copy)]
pub struct TopicResolver<'p> {
    autogenerated: Option<&'p AutogeneratedTopic>,
}

impl<'p> TopicResolver<'p> {
    /// Resolver that only uses declared topics.
    #[must_use]
    pub const fn declared() -> Self {
        Self { autogenerated: None }
    }

    /// Resolver that hands out `autogenerated` to every instance.
    #[must_use]
    pub const fn autogenerated(autogenerated: &'p AutogeneratedTopic) -> Self {
        Self { autogenerated: Some(autogenerated) }
    }

    /// Resolve the topic of the instance at the end of `chain`.
    ///
    /// # Errors
    /// Returns [`PerfError::Configuration`] when no tier declares a topic or
    /// the declared name is not a valid topic.
    pub fn resolve(&self, chain: &LayerChain<'_>, instance: &str) -> Result<ResolvedTopic> {
        if let Some(autogenerated) = self.autogenerated {
            return Ok(ResolvedTopic {
                topic: autogenerated.get_or_resolve()?,
                source: TopicSource::Autogenerated,
            });
        }

        let (tier, name) = chain.nearest_topic().ok_or_else(|| {
            PerfError::configuration(
                instance,
                "no topic set on the instance, its group or the profile, \
                 and topic autogeneration is off",
            )
        })?;
        let topic =
            Topic::new(name).map_err(|e| PerfError::configuration(instance, e.to_string()))?;
        Ok(ResolvedTopic { topic, source: TopicSource::Declared(tier) })
    }
}
