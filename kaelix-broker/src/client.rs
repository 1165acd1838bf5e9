//! Client side of the embedded broker.

use crate::broker::BrokerShared;
use async_trait::async_trait;
use kaelix_core::client::{
    Client, ClientConfig, ClientRole, Connector, Delivery, BOOTSTRAP_SERVERS, GROUP_ID,
    MAX_POLL_RECORDS,
};
use kaelix_core::{Error, Message, Record, Result, Topic};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, trace};

const PRODUCER_SETTINGS: &[&str] = &[BOOTSTRAP_SERVERS];
const CONSUMER_SETTINGS: &[&str] = &[BOOTSTRAP_SERVERS, GROUP_ID];

/// [`Connector`] for an [`EmbeddedBroker`](crate::EmbeddedBroker).
#[derive(Debug, Clone)]
pub struct EmbeddedConnector {
    shared: Arc<BrokerShared>,
}

impl EmbeddedConnector {
    pub(crate) fn new(shared: Arc<BrokerShared>) -> Self {
        Self { shared }
    }
}

#[async_trait]
impl Connector for EmbeddedConnector {
    fn required_settings(&self, role: ClientRole) -> &'static [&'static str] {
        match role {
            ClientRole::Producer => PRODUCER_SETTINGS,
            ClientRole::Consumer => CONSUMER_SETTINGS,
        }
    }

    async fn connect(&self, config: ClientConfig) -> Result<Box<dyn Client>> {
        let servers = config.get_str(BOOTSTRAP_SERVERS).ok_or_else(|| {
            Error::configuration(format!("'{BOOTSTRAP_SERVERS}' is required"))
        })?;
        if !servers.split(',').map(str::trim).any(|s| s == self.shared.address) {
            return Err(Error::connection(format!("no reachable broker in '{servers}'")));
        }
        if !self.shared.is_running() {
            return Err(Error::connection(format!("broker {} is not running", self.shared.address)));
        }
        if self.shared.faults().reject_connections {
            return Err(Error::connection(format!(
                "broker {} refused the connection",
                self.shared.address
            )));
        }

        let group = match config.role {
            ClientRole::Consumer => Some(config.get_str(GROUP_ID).ok_or_else(|| {
                Error::configuration(format!("'{GROUP_ID}' is required for consumers"))
            })?),
            ClientRole::Producer => None,
        };
        let max_poll_records = config
            .get_u64(MAX_POLL_RECORDS)?
            .map_or(self.shared.config.default_max_poll_records, |n| n as usize)
            .max(1);

        self.shared.client_opened();
        debug!(role = %config.role, group = ?group, "embedded client connected");
        Ok(Box::new(EmbeddedClient {
            shared: Arc::clone(&self.shared),
            group,
            max_poll_records,
            closed: false,
        }))
    }
}

/// A client connected to an embedded broker.
#[derive(Debug)]
pub struct EmbeddedClient {
    shared: Arc<BrokerShared>,
    group: Option<String>,
    max_poll_records: usize,
    closed: bool,
}

impl EmbeddedClient {
    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if !self.shared.is_running() {
            return Err(Error::connection(format!("broker {} is not running", self.shared.address)));
        }
        Ok(())
    }
}

#[async_trait]
impl Client for EmbeddedClient {
    async fn send(&mut self, record: Record) -> Result<Delivery> {
        self.ensure_usable()?;

        let admission = self.shared.admit_send();
        let shared = Arc::clone(&self.shared);
        let (tx, rx) = oneshot::channel();

        // Acknowledgements complete in the background, like a real client's
        // I/O thread; the caller decides whether to wait for them.
        tokio::spawn(async move {
            if !admission.latency.is_zero() {
                sleep(admission.latency).await;
            }
            let outcome = if admission.reject {
                Err(Error::delivery(record.topic.as_str(), "record rejected by broker"))
            } else {
                shared.append(record)
            };
            let _ = tx.send(outcome);
        });

        Ok(Box::pin(async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::connection("delivery abandoned before acknowledgement")),
            }
        }))
    }

    async fn poll(&mut self, topic: &Topic, timeout: Duration) -> Result<Vec<Message>> {
        self.ensure_usable()?;
        let Some(group) = self.group.as_deref() else {
            return Err(Error::configuration("producer clients cannot poll"));
        };

        let deadline = Instant::now() + timeout;
        let mut appended = self.shared.subscribe_appends();
        loop {
            let batch = self.shared.storage.fetch(topic, group, self.max_poll_records);
            if !batch.is_empty() {
                trace!(%topic, group, count = batch.len(), "poll returned batch");
                return Ok(batch);
            }
            if !self.shared.is_running() {
                return Err(Error::connection(format!(
                    "broker {} stopped while polling",
                    self.shared.address
                )));
            }
            match timeout_at(deadline, appended.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(Error::connection("broker released while polling")),
                Err(_) => return Ok(Vec::new()),
            }
        }
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.shared.client_closed();
        }
        Ok(())
    }
}

impl Drop for EmbeddedClient {
    fn drop(&mut self) {
        if !self.closed {
            self.shared.client_closed();
        }
    }
}
