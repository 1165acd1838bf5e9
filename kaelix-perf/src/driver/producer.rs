//! Producer driver.

use super::{close_quietly, finish, DriverReport, Progress, WorkloadDriver};
use crate::plan::{ProducerParams, WorkloadKind};
use crate::profile::{KeyAllocation, KeyAllocationType};
use crate::stop::StopSignal;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use kaelix_core::{Client, ClientConfig, Connector, Delivery, Record, Result, Topic};
use rand::Rng;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Chooses the key of each produced message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAllocator {
    /// Messages carry no key
    Unkeyed,
    /// Keys cycle through `0..unique_keys` in send order
    Fair {
        /// Size of the key space
        unique_keys: u32,
    },
    /// Keys are drawn uniformly from `0..unique_keys`
    Random {
        /// Size of the key space
        unique_keys: u32,
    },
}

impl KeyAllocator {
    /// Allocator for an optional key allocation setting.
    #[must_use]
    pub fn new(allocation: Option<KeyAllocation>) -> Self {
        match allocation {
            None => Self::Unkeyed,
            Some(KeyAllocation { kind: KeyAllocationType::Fair, unique_keys }) => {
                Self::Fair { unique_keys: unique_keys.max(1) }
            }
            Some(KeyAllocation { kind: KeyAllocationType::Random, unique_keys }) => {
                Self::Random { unique_keys: unique_keys.max(1) }
            }
        }
    }

    /// Key of the message with sequence number `seq`.
    #[must_use]
    pub fn key(&self, seq: u64) -> Option<Bytes> {
        let slot = match *self {
            Self::Unkeyed => return None,
            Self::Fair { unique_keys } => seq % u64::from(unique_keys),
            Self::Random { unique_keys } => u64::from(rand::thread_rng().gen_range(0..unique_keys)),
        };
        Some(Bytes::from(format!("key-{slot}")))
    }
}

/// Sends a fixed number of equally sized messages to one topic.
#[derive(Debug)]
pub struct ProducerDriver {
    id: String,
    topic: Topic,
    config: ClientConfig,
    params: ProducerParams,
    connector: Arc<dyn Connector>,
    keys: KeyAllocator,
    payload: Bytes,
    progress: Progress,
}

impl ProducerDriver {
    /// Create a producer. The payload is generated here, once, and shared
    /// by every message.
    #[must_use]
    pub fn new(
        id: String,
        topic: Topic,
        config: ClientConfig,
        params: ProducerParams,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let mut payload = vec![0u8; params.message_size];
        rand::thread_rng().fill(payload.as_mut_slice());
        Self {
            id,
            topic,
            config,
            keys: KeyAllocator::new(params.key_allocation),
            params,
            connector,
            payload: Bytes::from(payload),
            progress: Progress::default(),
        }
    }

    /// Messages acknowledged so far.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.progress.get()
    }

    fn record(&self, seq: u64) -> Record {
        Record::new(self.topic.clone(), self.payload.clone()).with_key(self.keys.key(seq))
    }

    async fn produce(&self, client: &mut dyn Client, stop: &StopSignal) -> Result<bool> {
        let mut pending: FuturesUnordered<Delivery> = FuturesUnordered::new();

        for seq in 0..self.params.messages_to_send {
            if stop.is_stopped() {
                debug!(instance = %self.id, issued = seq, "stop observed, no further sends");
                break;
            }

            let delivery = client.send(self.record(seq)).await?;
            if self.params.send_blocking {
                delivery.await?;
                self.progress.add(1);
            } else {
                pending.push(delivery);
                while let Some(Some(acked)) = pending.next().now_or_never() {
                    acked?;
                    self.progress.add(1);
                }
            }

            if let Some(delay) = self.params.send_delay {
                stop.pause(delay).await;
            }
        }

        // acknowledgement phase
        while let Some(acked) = pending.next().await {
            acked?;
            self.progress.add(1);
        }

        Ok(self.is_complete())
    }
}

#[async_trait]
impl WorkloadDriver for ProducerDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Producer
    }

    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn target(&self) -> u64 {
        self.params.messages_to_send
    }

    async fn run(&self, stop: StopSignal) -> DriverReport {
        let started_at = Instant::now();
        info!(
            instance = %self.id,
            topic = %self.topic,
            messages = self.params.messages_to_send,
            size = self.params.message_size,
            blocking = self.params.send_blocking,
            "producer starting"
        );

        let result = match self.connector.connect(self.config.clone()).await {
            Ok(mut client) => {
                let result = self.produce(client.as_mut(), &stop).await;
                close_quietly(&self.id, client).await;
                result
            }
            Err(err) => Err(err),
        };

        let report = finish(self, started_at, result);
        info!(
            instance = %self.id,
            sent = report.transferred,
            outcome = ?report.outcome,
            "producer finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_keys_cycle_in_order() {
        let keys = KeyAllocator::new(Some(KeyAllocation {
            kind: KeyAllocationType::Fair,
            unique_keys: 3,
        }));
        let seen: Vec<_> = (0..6).map(|seq| keys.key(seq).unwrap()).collect();
        assert_eq!(seen[0], Bytes::from_static(b"key-0"));
        assert_eq!(seen[2], Bytes::from_static(b"key-2"));
        assert_eq!(seen[3], seen[0]);
        assert_eq!(seen[5], seen[2]);
    }

    #[test]
    fn random_keys_stay_in_range() {
        let keys = KeyAllocator::new(Some(KeyAllocation {
            kind: KeyAllocationType::Random,
            unique_keys: 4,
        }));
        for seq in 0..200 {
            let key = keys.key(seq).unwrap();
            let text = std::str::from_utf8(&key).unwrap();
            let slot: u32 = text.trim_start_matches("key-").parse().unwrap();
            assert!(slot < 4);
        }
    }

    #[test]
    fn unkeyed_by_default() {
        assert_eq!(KeyAllocator::new(None), KeyAllocator::Unkeyed);
        assert_eq!(KeyAllocator::Unkeyed.key(9), None);
    }
}
