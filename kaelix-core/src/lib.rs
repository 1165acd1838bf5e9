//! # Kaelix Core
//!
//! Messaging primitives shared by the Kaelix performance tooling.
//!
//! The crate defines what a message and a topic
//! are, and the client interface ([`Connector`] / [`Client`]) through which
//! load-generating workloads talk to a broker. Backends implement the
//! interface; the harness only ever depends on the traits.
//!
//! ## Quick Start
//!
//! ```rust
//! use kaelix_core::{Message, Topic};
//! use bytes::Bytes;
//!
//! # fn main() -> kaelix_core::Result<()> {
//! let topic = Topic::new("orders")?;
//! let message = Message::new(topic, Bytes::from("Hello, Kaelix!"));
//! assert_eq!(message.payload_size(), 14);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`message`]: Message, message id and topic types
//! - [`client`]: Connector/client traits, records and delivery receipts
//! - [`error`]: Error types and result handling
//! - [`types`]: Offsets and timestamps
//! - [`prelude`]: Common imports for convenient usage

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod message;
pub mod prelude;
pub mod types;

pub use crate::{
    client::{Client, ClientConfig, ClientRole, ClientSettings, Connector, Delivery, Record},
    error::{Error, Result},
    message::{Message, MessageId, Topic},
    types::{Offset, Timestamp},
};
