//! Broker configuration and fault injection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an embedded broker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Scheme used when building the broker address
    pub scheme: String,

    /// Batch size used when a consumer does not set `max.poll.records`
    pub default_max_poll_records: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { scheme: "embedded".to_string(), default_max_poll_records: 500 }
    }
}

/// Faults the broker injects into client traffic.
///
/// Faults can be changed while clients are connected; each send reads the
/// current settings when it is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerFaults {
    /// Delay between accepting a record and acknowledging it
    pub send_latency: Duration,

    /// Acknowledge this many sends, then reject every later one
    pub fail_sends_after: Option<u64>,

    /// Refuse new client connections
    pub reject_connections: bool,
}

impl BrokerFaults {
    /// No faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Slow every acknowledgement down by `latency`.
    #[must_use]
    pub fn with_send_latency(mut self, latency: Duration) -> Self {
        self.send_latency = latency;
        self
    }

    /// Reject every send after the first `accepted`.
    #[must_use]
    pub const fn with_fail_sends_after(mut self, accepted: u64) -> Self {
        self.fail_sends_after = Some(accepted);
        self
    }

    /// Refuse connections.
    #[must_use]
    pub const fn with_rejected_connections(mut self) -> Self {
        self.reject_connections = true;
        self
    }
}
