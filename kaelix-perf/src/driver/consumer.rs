//! Consumer driver.

use super::{close_quietly, finish, DriverReport, Progress, WorkloadDriver};
use crate::plan::{ConsumerParams, WorkloadKind};
use crate::stop::StopSignal;
use async_trait::async_trait;
use kaelix_core::{Client, ClientConfig, Connector, Result, Topic};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Polls one topic until a message count is reached.
#[derive(Debug)]
pub struct ConsumerDriver {
    id: String,
    topic: Topic,
    config: ClientConfig,
    params: ConsumerParams,
    connector: Arc<dyn Connector>,
    progress: Progress,
}

impl ConsumerDriver {
    /// Create a consumer.
    #[must_use]
    pub fn new(
        id: String,
        topic: Topic,
        config: ClientConfig,
        params: ConsumerParams,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self { id, topic, config, params, connector, progress: Progress::default() }
    }

    /// Messages received so far; readable while the driver runs.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.progress.get()
    }

    async fn consume(&self, client: &mut dyn Client, stop: &StopSignal) -> Result<bool> {
        let target = self.params.messages_to_receive;
        let mut received = 0;

        while received < target {
            if stop.is_stopped() {
                debug!(instance = %self.id, received, "stop observed between polls");
                return Ok(false);
            }

            let batch = client.poll(&self.topic, self.params.poll_timeout).await?;
            if batch.is_empty() {
                continue;
            }

            let before = received;
            received = self.progress.add(batch.len() as u64);
            if let Some(every) = self.params.report_every {
                if received / every > before / every {
                    info!(instance = %self.id, received, target, "consumer progress");
                }
            }

            if let Some(delay) = self.params.receive_delay {
                stop.pause(delay).await;
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl WorkloadDriver for ConsumerDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Consumer
    }

    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn target(&self) -> u64 {
        self.params.messages_to_receive
    }

    async fn run(&self, stop: StopSignal) -> DriverReport {
        let started_at = Instant::now();
        info!(
            instance = %self.id,
            topic = %self.topic,
            messages = self.params.messages_to_receive,
            "consumer starting"
        );

        let result = match self.connector.connect(self.config.clone()).await {
            Ok(mut client) => {
                let result = self.consume(client.as_mut(), &stop).await;
                close_quietly(&self.id, client).await;
                result
            }
            Err(err) => Err(err),
        };

        let report = finish(self, started_at, result);
        info!(
            instance = %self.id,
            received = report.transferred,
            outcome = ?report.outcome,
            "consumer finished"
        );
        report
    }
}
