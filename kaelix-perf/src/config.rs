//! Layered workload configuration.
//!
//! Settings can be attached to a profile, to a producer or consumer group,
//! and to an individual workload instance. All three tiers share the
//! [`ConfigNode`] shape. The effective settings of an instance are the
//! right-biased union of its chain, so an instance overrides its group and
//! a group overrides the profile.

use kaelix_core::ClientSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque client settings. Keys and values are passed through to the
/// client untouched.
pub type Settings = ClientSettings;

/// Where in the profile a [`ConfigNode`] is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Settings shared by every workload in the profile
    Profile,
    /// Settings shared by the producer group or the consumer group
    Group,
    /// Settings of a single workload
    Instance,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile => f.write_str("profile"),
            Self::Group => f.write_str("group"),
            Self::Instance => f.write_str("instance"),
        }
    }
}

/// A settings bag plus an optional topic, attachable at any [`Tier`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    /// Client settings contributed by this node
    #[serde(default, rename = "config", skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,

    /// Topic declared at this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl ConfigNode {
    /// Node with settings and no topic.
    #[must_use]
    pub const fn with_settings(settings: Settings) -> Self {
        Self { settings, topic: None }
    }

    /// Set the topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add a single setting.
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// The declared topic, ignoring blank values. Non-blank names are
    /// returned as written, surrounding whitespace included.
    #[must_use]
    pub fn declared_topic(&self) -> Option<&str> {
        self.topic.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Combine settings layers, lowest precedence first.
///
/// Keys in a later layer replace the value set by any earlier layer; keys a
/// later layer does not mention keep their earlier value. The inputs are
/// not modified.
pub fn merge<'a, I>(layers: I) -> Settings
where
    I: IntoIterator<Item = &'a Settings>,
{
    let mut merged = Settings::new();
    for layer in layers {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// The three nodes that configure one workload instance.
#[derive(Debug, Clone, Copy)]
pub struct LayerChain<'a> {
    /// Profile tier
    pub profile: &'a ConfigNode,
    /// Group tier
    pub group: &'a ConfigNode,
    /// Instance tier
    pub instance: &'a ConfigNode,
}

impl<'a> LayerChain<'a> {
    /// Build a chain.
    #[must_use]
    pub const fn new(
        profile: &'a ConfigNode,
        group: &'a ConfigNode,
        instance: &'a ConfigNode,
    ) -> Self {
        Self { profile, group, instance }
    }

    /// Nodes from lowest to highest precedence.
    #[must_use]
    pub const fn layers(&self) -> [(Tier, &'a ConfigNode); 3] {
        [(Tier::Profile, self.profile), (Tier::Group, self.group), (Tier::Instance, self.instance)]
    }

    /// `merge(profile, group, instance)`.
    #[must_use]
    pub fn effective_settings(&self) -> Settings {
        merge(self.layers().iter().map(|(_, node)| &node.settings))
    }

    /// The nearest declared topic walking instance, group, profile.
    #[must_use]
    pub fn nearest_topic(&self) -> Option<(Tier, &'a str)> {
        self.layers()
            .into_iter()
            .rev()
            .find_map(|(tier, node)| node.declared_topic().map(|topic| (tier, topic)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::btree_map;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn settings(pairs: &[(&str, Value)]) -> Settings {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let profile = settings(&[("acks", json!("all")), ("linger.ms", json!(5))]);
        let group = settings(&[("linger.ms", json!(10)), ("batch.size", json!(0))]);
        let instance = settings(&[("batch.size", json!(16384))]);

        let merged = merge([&profile, &group, &instance]);

        assert_eq!(merged["acks"], json!("all"));
        assert_eq!(merged["linger.ms"], json!(10));
        assert_eq!(merged["batch.size"], json!(16384));
        assert_eq!(merged.len(), 3);
        // inputs untouched
        assert_eq!(group["linger.ms"], json!(10));
        assert_eq!(instance.len(), 1);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge(std::iter::empty::<&Settings>()).is_empty());
        let empty = Settings::new();
        assert!(merge([&empty, &empty]).is_empty());
    }

    #[test]
    fn nearest_topic_prefers_instance_and_skips_blank() {
        let profile = ConfigNode::default().topic("p");
        let group = ConfigNode::default().topic("g");
        let blank = ConfigNode::default().topic("  ");
        let instance = ConfigNode::default().topic("i");

        fn nearest<'a>(
            p: &'a ConfigNode,
            g: &'a ConfigNode,
            i: &'a ConfigNode,
        ) -> Option<(Tier, &'a str)> {
            LayerChain::new(p, g, i).nearest_topic()
        }

        assert_eq!(nearest(&profile, &group, &instance), Some((Tier::Instance, "i")));
        assert_eq!(nearest(&profile, &group, &blank), Some((Tier::Group, "g")));
        assert_eq!(nearest(&profile, &blank, &blank), Some((Tier::Profile, "p")));
        assert_eq!(nearest(&blank, &blank, &blank), None);
    }

    #[test]
    fn config_node_uses_config_key() {
        let node: ConfigNode = serde_json::from_value(json!({
            "config": { "group.id": "bar" },
            "topic": "foo"
        }))
        .unwrap();
        assert_eq!(node.settings["group.id"], json!("bar"));
        assert_eq!(node.declared_topic(), Some("foo"));
    }

    fn settings_strategy() -> impl Strategy<Value = Settings> {
        // a small key space makes overlapping keys likely
        btree_map("[a-e]", any::<i32>().prop_map(Value::from), 0..5)
    }

    proptest! {
        #[test]
        fn merge_takes_value_from_highest_layer(
            profile in settings_strategy(),
            group in settings_strategy(),
            instance in settings_strategy(),
        ) {
            let merged = merge([&profile, &group, &instance]);

            for (key, value) in &merged {
                let expected =
                    instance.get(key).or_else(|| group.get(key)).or_else(|| profile.get(key));
                prop_assert_eq!(Some(value), expected);
            }
            for key in profile.keys().chain(group.keys()).chain(instance.keys()) {
                prop_assert!(merged.contains_key(key));
            }
        }

        #[test]
        fn merge_is_idempotent_on_its_output(
            profile in settings_strategy(),
            group in settings_strategy(),
            instance in settings_strategy(),
        ) {
            let merged = merge([&profile, &group, &instance]);
            prop_assert_eq!(merge([&merged]), merged.clone());
            prop_assert_eq!(merge([&merged, &merged]), merged);
        }
    }
}
