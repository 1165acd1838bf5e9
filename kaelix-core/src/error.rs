//! Error types for the Kaelix client interface.

use thiserror::Error;

/// Errors raised by a messaging client or by message construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid message format or content
    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },

    /// The client could not reach or stay connected to the broker
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Client settings were missing or malformed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The broker refused or lost a message after it was handed to the client
    #[error("Delivery to topic '{topic}' failed: {message}")]
    Delivery { topic: String, message: String },

    /// Operation attempted on a client that has already been closed
    #[error("Client is closed")]
    Closed,
}

/// Result type alias for Kaelix operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::Connection`].
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Shorthand for a [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Shorthand for a [`Error::Delivery`].
    pub fn delivery(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery { topic: topic.into(), message: message.into() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization { message: err.to_string() }
    }
}
