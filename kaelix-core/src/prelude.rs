//! # Prelude
//!
//! The prelude module provides convenient access to commonly used types and traits
//! from the Kaelix Core library.

pub use crate::{
    client::{
        Client, ClientConfig, ClientRole, ClientSettings, Connector, Delivery, DeliveryReceipt,
        Record,
    },
    error::{Error, Result},
    message::{Message, MessageId, Topic},
    types::{Offset, Timestamp},
};

pub use bytes::Bytes;
