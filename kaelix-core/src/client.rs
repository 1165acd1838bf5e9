//! Client interface between workloads and a messaging backend.
//!
//! A [`Connector`] turns a flat settings map into a connected [`Client`].
//! Clients publish with [`Client::send`] and fetch with [`Client::poll`].
//! How records travel to the broker is entirely up to the implementation;
//! callers only see the settings they pass in and the outcomes they get back.
//!
//! Sends report failure in two places. An `Err` from `send` itself means the
//! record was never accepted by the client. Once accepted, the returned
//! [`Delivery`] resolves when the broker acknowledges the record or rejects
//! it, which lets callers choose between awaiting each delivery in turn and
//! collecting them in the background.

use crate::message::{Message, Topic};
use crate::types::{Offset, Timestamp};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Broker address list, comma separated.
pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
/// Consumer group used to track consumption offsets.
pub const GROUP_ID: &str = "group.id";
/// Upper bound on the number of messages returned by one poll.
pub const MAX_POLL_RECORDS: &str = "max.poll.records";

/// Opaque client settings, keyed by setting name.
pub type ClientSettings = BTreeMap<String, Value>;

/// Pending acknowledgement for a record accepted by [`Client::send`].
pub type Delivery = BoxFuture<'static, Result<DeliveryReceipt>>;

/// What a client is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    /// Publishes records
    Producer,
    /// Polls records
    Consumer,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Settings handed to [`Connector::connect`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Role the client will play
    pub role: ClientRole,
    /// Effective settings for this client
    pub settings: ClientSettings,
}

impl ClientConfig {
    /// Create a client configuration.
    #[must_use]
    pub const fn new(role: ClientRole, settings: ClientSettings) -> Self {
        Self { role, settings }
    }

    /// Look up a setting as a string. Numbers and booleans are rendered.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.settings.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Look up a setting as an unsigned integer, accepting numeric strings.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the key is present but not a
    /// non-negative integer.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        let Some(value) = self.settings.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            Error::configuration(format!(
                "setting '{key}' must be a non-negative integer, got {value}"
            ))
        })
    }
}

/// A record to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Destination topic
    pub topic: Topic,
    /// Optional key
    pub key: Option<Bytes>,
    /// Payload bytes
    pub payload: Bytes,
}

impl Record {
    /// Create a record without a key.
    #[must_use]
    pub const fn new(topic: Topic, payload: Bytes) -> Self {
        Self { topic, key: None, payload }
    }

    /// Attach a key.
    #[must_use]
    pub fn with_key(mut self, key: Option<Bytes>) -> Self {
        self.key = key;
        self
    }
}

/// Broker acknowledgement of a published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Topic the record landed in
    pub topic: Topic,
    /// Offset assigned by the broker
    pub offset: Offset,
    /// Time the broker accepted the record
    pub timestamp: Timestamp,
}

/// Factory for connected clients.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Settings that must be present before a client of `role` can connect.
    fn required_settings(&self, _role: ClientRole) -> &'static [&'static str] {
        &[]
    }

    /// Open a client.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for unusable settings and
    /// [`Error::Connection`] when the broker cannot be reached.
    async fn connect(&self, config: ClientConfig) -> Result<Box<dyn Client>>;
}

/// A connected messaging client.
#[async_trait]
pub trait Client: Send {
    /// Hand a record to the client.
    ///
    /// # Errors
    /// Returns an error if the client refuses the record outright; failures
    /// after acceptance are reported through the returned [`Delivery`].
    async fn send(&mut self, record: Record) -> Result<Delivery>;

    /// Fetch the next batch of messages for `topic`, waiting at most
    /// `timeout` for at least one. An empty batch means nothing arrived.
    ///
    /// # Errors
    /// Returns an error if the client is closed or the broker is unreachable.
    async fn poll(&mut self, topic: &Topic, timeout: Duration) -> Result<Vec<Message>>;

    /// Release the client.
    ///
    /// # Errors
    /// Returns an error if the client could not shut down cleanly.
    async fn close(self: Box<Self>) -> Result<()>;
}
