//! # Kaelix Broker
//!
//! Embedded, in-process message broker used to stand up a throwaway
//! backend for Kaelix workloads.
//!
//! This crate provides:
//! - Topic logs with consumer-group read positions
//! - A [`Connector`](kaelix_core::Connector) implementation for producers and consumers
//! - Fault injection (slow acknowledgements, rejected sends, refused connections)
//!
//! ## Examples
//!
//! ```rust
//! use kaelix_broker::{BrokerConfig, EmbeddedBroker};
//!
//! # fn example() -> kaelix_core::Result<()> {
//! let broker = EmbeddedBroker::new(BrokerConfig::default());
//! let address = broker.start()?;
//! // put `address` in `bootstrap.servers` and connect through `broker.connector()`
//! broker.stop();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod broker;
pub mod client;
pub mod config;
pub mod storage;

pub use broker::{BrokerStats, EmbeddedBroker};
pub use client::{EmbeddedClient, EmbeddedConnector};
pub use config::{BrokerConfig, BrokerFaults};
pub use kaelix_core::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{BrokerConfig, BrokerFaults, EmbeddedBroker, EmbeddedConnector};
    pub use kaelix_core::prelude::*;
}
