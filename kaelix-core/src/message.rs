//! Message types and utilities for the streaming system.

use crate::types::{Offset, Timestamp};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest topic name accepted by [`Topic::new`].
pub const MAX_TOPIC_LEN: usize = 255;

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new unique message ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topic name for message routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Create a new topic.
    ///
    /// # Errors
    /// Returns an error if the topic name is empty, longer than
    /// [`MAX_TOPIC_LEN`] or contains characters other than ASCII
    /// alphanumerics, `-`, `_` and `.`.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidMessage {
                message: "Topic name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_TOPIC_LEN {
            return Err(crate::Error::InvalidMessage {
                message: format!("Topic name cannot exceed {MAX_TOPIC_LEN} characters"),
            });
        }

        if let Some(bad) =
            name.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(crate::Error::InvalidMessage {
                message: format!("Topic name '{name}' contains invalid character '{bad}'"),
            });
        }

        Ok(Self(name))
    }

    /// Get the topic name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// A message as stored by the broker and handed back to consumers.
///
/// Payloads are [`Bytes`] so that a producer can hand the same buffer to
/// every send without copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier
    pub id: MessageId,

    /// Topic the message was published to
    pub topic: Topic,

    /// Optional partitioning key
    pub key: Option<Bytes>,

    /// Message payload
    pub payload: Bytes,

    /// Time the broker accepted the message
    pub timestamp: Timestamp,

    /// Position in the topic log, assigned by the broker
    pub offset: Option<Offset>,
}

impl Message {
    /// Create a new message with the given topic and payload.
    #[must_use]
    pub fn new(topic: Topic, payload: Bytes) -> Self {
        Self {
            id: MessageId::new(),
            topic,
            key: None,
            payload,
            timestamp: Utc::now(),
            offset: None,
        }
    }

    /// Attach a key to the message.
    #[must_use]
    pub fn with_key(mut self, key: Bytes) -> Self {
        self.key = Some(key);
        self
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}
