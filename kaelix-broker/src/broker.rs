//! Embedded broker lifecycle.

use crate::client::EmbeddedConnector;
use crate::config::{BrokerConfig, BrokerFaults};
use crate::storage::MemoryStorage;
use kaelix_core::{Error, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// In-process broker for tests and local runs.
///
/// The broker keeps one append-only log per topic and hands out
/// [`EmbeddedConnector`]s that workloads use like any other backend.
#[derive(Debug, Clone)]
pub struct EmbeddedBroker {
    shared: Arc<BrokerShared>,
}

/// State shared between the broker and its clients.
#[derive(Debug)]
pub(crate) struct BrokerShared {
    pub(crate) address: String,
    pub(crate) config: BrokerConfig,
    pub(crate) storage: MemoryStorage,
    running: AtomicBool,
    faults: RwLock<BrokerFaults>,
    sends_admitted: AtomicU64,
    sends_rejected: AtomicU64,
    open_clients: AtomicUsize,
    appended: watch::Sender<u64>,
}

/// How a newly accepted send should be treated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SendAdmission {
    pub(crate) latency: std::time::Duration,
    pub(crate) reject: bool,
}

impl EmbeddedBroker {
    /// Create a stopped broker.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        let address = format!("{}://{}", config.scheme, Uuid::new_v4());
        let (appended, _) = watch::channel(0);
        Self {
            shared: Arc::new(BrokerShared {
                address,
                config,
                storage: MemoryStorage::new(),
                running: AtomicBool::new(false),
                faults: RwLock::new(BrokerFaults::none()),
                sends_admitted: AtomicU64::new(0),
                sends_rejected: AtomicU64::new(0),
                open_clients: AtomicUsize::new(0),
                appended,
            }),
        }
    }

    /// Start accepting clients and return the address to put in
    /// `bootstrap.servers`.
    ///
    /// # Errors
    /// Returns an error if the broker is already running.
    pub fn start(&self) -> Result<String> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(Error::connection(format!(
                "broker {} is already running",
                self.shared.address
            )));
        }
        info!(address = %self.shared.address, "embedded broker started");
        Ok(self.shared.address.clone())
    }

    /// Stop the broker. Connected clients fail on their next operation and
    /// pending polls return.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.appended.send_modify(|_| {});
            info!(address = %self.shared.address, "embedded broker stopped");
        }
    }

    /// Broker address, valid whether or not the broker is running.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Whether the broker accepts traffic.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Connector bound to this broker.
    #[must_use]
    pub fn connector(&self) -> EmbeddedConnector {
        EmbeddedConnector::new(Arc::clone(&self.shared))
    }

    /// Replace the active fault settings.
    pub fn set_faults(&self, faults: BrokerFaults) {
        debug!(?faults, "updating broker faults");
        *self.shared.faults.write() = faults;
    }

    /// Number of messages stored for `topic`.
    #[must_use]
    pub fn message_count(&self, topic: &kaelix_core::Topic) -> usize {
        self.shared.storage.len(topic)
    }

    /// Current broker statistics.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            running: self.shared.is_running(),
            open_clients: self.shared.open_clients.load(Ordering::Relaxed),
            topic_count: self.shared.storage.topic_count(),
            messages_appended: *self.shared.appended.borrow(),
            sends_rejected: self.shared.sends_rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmbeddedBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl Drop for BrokerShared {
    fn drop(&mut self) {
        debug!(address = %self.address, "embedded broker released");
    }
}

impl BrokerShared {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn faults(&self) -> BrokerFaults {
        self.faults.read().clone()
    }

    /// Count a send against the fault budget.
    pub(crate) fn admit_send(&self) -> SendAdmission {
        let faults = self.faults.read();
        let index = self.sends_admitted.fetch_add(1, Ordering::SeqCst);
        let reject = faults.fail_sends_after.is_some_and(|limit| index >= limit);
        if reject {
            self.sends_rejected.fetch_add(1, Ordering::Relaxed);
        }
        SendAdmission { latency: faults.send_latency, reject }
    }

    /// Store a record and wake pending polls.
    pub(crate) fn append(
        &self,
        record: kaelix_core::Record,
    ) -> Result<kaelix_core::client::DeliveryReceipt> {
        if !self.is_running() {
            return Err(Error::connection(format!("broker {} is not running", self.address)));
        }
        let receipt = self.storage.append(record);
        self.appended.send_modify(|count| *count += 1);
        Ok(receipt)
    }

    pub(crate) fn subscribe_appends(&self) -> watch::Receiver<u64> {
        self.appended.subscribe()
    }

    pub(crate) fn client_opened(&self) {
        self.open_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn client_closed(&self) {
        self.open_clients.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Broker runtime statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerStats {
    /// Whether the broker is currently running
    pub running: bool,
    /// Number of clients that have connected and not yet closed
    pub open_clients: usize,
    /// Number of topics holding messages
    pub topic_count: usize,
    /// Messages appended since the broker was created
    pub messages_appended: u64,
    /// Sends rejected by injected faults
    pub sends_rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_returns_address_once() {
        let broker = EmbeddedBroker::default();
        let address = broker.start().unwrap();
        assert!(address.starts_with("embedded://"));
        assert_eq!(address, broker.address());
        assert!(broker.start().is_err());

        broker.stop();
        assert!(!broker.is_running());
        assert!(broker.start().is_ok());
    }

    #[test]
    fn fault_budget_rejects_after_limit() {
        let broker = EmbeddedBroker::default();
        broker.set_faults(BrokerFaults::none().with_fail_sends_after(2));
        let verdicts: Vec<bool> = (0..4).map(|_| broker.shared.admit_send().reject).collect();
        assert_eq!(verdicts, vec![false, false, true, true]);
        assert_eq!(broker.stats().sends_rejected, 2);
    }
}
