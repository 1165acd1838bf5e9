//! End-to-end profile runs against an embedded broker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use kaelix_broker::{BrokerFaults, EmbeddedBroker};
use kaelix_core::{Client, ClientConfig, Topic};
use kaelix_perf::prelude::*;
use kaelix_perf::topic::AUTOGENERATED_TOPIC_PREFIX;
use serde_json::{json, Value};

struct Fixture {
    broker: EmbeddedBroker,
    address: String,
}

impl Fixture {
    fn start() -> Result<Self> {
        kaelix_perf::telemetry::init_tracing(&HarnessConfig::default());
        let broker = EmbeddedBroker::default();
        let address = broker.start()?;
        Ok(Self { broker, address })
    }

    fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.broker.connector())
    }

    fn executor(&self, document: &Value) -> Result<TestProfileExecutor> {
        let harness = HarnessConfig::default().with_shutdown_grace(Duration::from_secs(3));
        self.executor_with(document, harness)
    }

    fn executor_with(
        &self,
        document: &Value,
        harness: HarnessConfig,
    ) -> Result<TestProfileExecutor> {
        let profile = TestProfile::from_json_str(&document.to_string())?;
        Ok(TestProfileExecutor::new(profile, self.connector()).with_harness_config(harness))
    }

    /// One producer and one consumer on topic "foo", consumer group "bar".
    fn single_pair(&self, concurrent: bool, producer: Value, consumer: Value) -> Value {
        let producer = merge_objects(json!({ "topic": "foo" }), producer);
        let consumer = merge_objects(json!({ "topic": "foo", "pollTimeoutMs": 100 }), consumer);
        json!({
            "config": { "bootstrap.servers": self.address },
            "concurrent": concurrent,
            "maxDuration": 30,
            "producers": { "instances": [producer] },
            "consumers": { "config": { "group.id": "bar" }, "instances": [consumer] }
        })
    }
}

fn merge_objects(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

#[tokio::test]
async fn sequential_run_drains_producer_before_consumer() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&fixture.single_pair(
        false,
        json!({ "messageSize": 100 * 1024, "messagesToSend": 1000, "sendBlocking": true }),
        json!({ "messagesToReceive": 1000 }),
    ))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Completed);
    assert_eq!(executor.state(), RunState::Finished);
    let producer = report.instance("producer-0").expect("producer report");
    let consumer = report.instance("consumer-0").expect("consumer report");
    assert_eq!(producer.sent, Some(1000));
    assert_eq!(consumer.received, Some(1000));
    assert!(producer.finished <= consumer.started);
    assert_eq!(fixture.broker.message_count(&Topic::new("foo")?), 1000);
    assert_eq!(fixture.broker.stats().open_clients, 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_run_completes_before_the_bound() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&fixture.single_pair(
        true,
        json!({ "messageSize": 1024, "messagesToSend": 1000 }),
        json!({ "messagesToReceive": 1000 }),
    ))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Completed);
    assert_eq!(report.total_sent(), 1000);
    assert_eq!(report.total_received(), 1000);
    assert!(report.instances.iter().all(|i| i.status == InstanceStatus::Completed));
    assert!(report.elapsed < Duration::from_secs(30));
    Ok(())
}

#[tokio::test]
async fn slow_backend_times_out_with_partial_counts() -> Result<()> {
    let fixture = Fixture::start()?;
    fixture.broker.set_faults(BrokerFaults::none().with_send_latency(Duration::from_millis(20)));

    let mut document = fixture.single_pair(
        true,
        json!({ "messageSize": 1024, "messagesToSend": 1000, "sendBlocking": true }),
        json!({ "messagesToReceive": 1000 }),
    );
    document["maxDuration"] = json!(1);
    let executor = fixture.executor(&document)?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::TimedOut);
    let producer = report.instance("producer-0").expect("producer report");
    let consumer = report.instance("consumer-0").expect("consumer report");
    assert!(producer.sent.unwrap_or_default() < 1000);
    assert!(consumer.received.unwrap_or_default() < 1000);
    assert_eq!(producer.status, InstanceStatus::Stopped);
    assert_eq!(consumer.status, InstanceStatus::Stopped);
    assert!(report.elapsed < Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn autogenerated_topic_overrides_declared_topics() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&json!({
        "config": { "bootstrap.servers": fixture.address },
        "concurrent": false,
        "autogenerateTopic": true,
        "producers": { "instances": [{ "messagesToSend": 10, "sendBlocking": true }] },
        "consumers": {
            "instances": [
                { "topic": "a", "config": { "group.id": "first" }, "messagesToReceive": 10 },
                { "topic": "b", "config": { "group.id": "second" }, "messagesToReceive": 10 }
            ]
        }
    }))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Completed);
    let topics: Vec<&str> = report.instances.iter().map(|i| i.topic.as_str()).collect();
    assert!(topics.iter().all(|t| *t == topics[0]));
    assert!(topics[0].starts_with(AUTOGENERATED_TOPIC_PREFIX));
    assert_eq!(report.total_received(), 20);
    assert_eq!(fixture.broker.message_count(&Topic::new(topics[0])?), 10);
    assert_eq!(fixture.broker.message_count(&Topic::new("a")?), 0);
    Ok(())
}

#[tokio::test]
async fn send_failure_fails_the_run() -> Result<()> {
    let fixture = Fixture::start()?;
    fixture.broker.set_faults(BrokerFaults::none().with_fail_sends_after(100));
    let executor = fixture.executor(&fixture.single_pair(
        true,
        json!({ "messagesToSend": 1000, "sendBlocking": true }),
        json!({ "messagesToReceive": 1000 }),
    ))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Failed);
    let producer = report.instance("producer-0").expect("producer report");
    assert_eq!(producer.status, InstanceStatus::Failed);
    assert_eq!(producer.sent, Some(100));
    assert!(producer.error.as_deref().unwrap_or_default().contains("producer-0"));
    let consumer = report.instance("consumer-0").expect("consumer report");
    assert!(matches!(consumer.status, InstanceStatus::Stopped | InstanceStatus::Aborted));
    Ok(())
}

#[tokio::test]
async fn failure_does_not_wait_for_other_workloads() -> Result<()> {
    let fixture = Fixture::start()?;
    fixture.broker.set_faults(BrokerFaults::none().with_fail_sends_after(0));
    let executor = fixture.executor(&fixture.single_pair(
        true,
        json!({ "messagesToSend": 10, "sendBlocking": true }),
        json!({ "messagesToReceive": 10, "pollTimeoutMs": 4000 }),
    ))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Failed);
    assert!(report.elapsed < Duration::from_secs(2));
    let producer = report.instance("producer-0").expect("producer report");
    assert_eq!(producer.status, InstanceStatus::Failed);
    assert_eq!(producer.sent, Some(0));
    let consumer = report.instance("consumer-0").expect("consumer report");
    assert_eq!(consumer.status, InstanceStatus::Aborted);
    assert_eq!(consumer.received, Some(0));
    Ok(())
}

#[tokio::test]
async fn timed_out_workload_past_the_grace_is_aborted() -> Result<()> {
    let fixture = Fixture::start()?;
    let harness = HarnessConfig::default().with_shutdown_grace(Duration::ZERO);
    let executor = fixture.executor_with(
        &json!({
            "config": { "bootstrap.servers": fixture.address, "group.id": "bar" },
            "topic": "quiet",
            "maxDuration": 1,
            "consumers": { "instances": [{ "messagesToReceive": 10, "pollTimeoutMs": 10000 }] }
        }),
        harness,
    )?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::TimedOut);
    let consumer = report.instance("consumer-0").expect("consumer report");
    assert_eq!(consumer.status, InstanceStatus::Aborted);
    assert_eq!(consumer.received, Some(0));
    assert_eq!(consumer.finished, None);
    assert!(report.elapsed < Duration::from_secs(5));
    Ok(())
}

#[derive(Debug)]
struct PanickingConnector;

#[async_trait]
impl Connector for PanickingConnector {
    async fn connect(&self, _config: ClientConfig) -> kaelix_core::Result<Box<dyn Client>> {
        panic!("connector blew up");
    }
}

#[tokio::test]
async fn panicking_workload_fails_the_run() -> Result<()> {
    let profile = TestProfile::from_json_str(
        &json!({
            "topic": "foo",
            "producers": { "instances": [{ "messagesToSend": 10 }] }
        })
        .to_string(),
    )?;
    let executor = TestProfileExecutor::new(profile, Arc::new(PanickingConnector));

    let report = tokio::time::timeout(Duration::from_secs(5), executor.run()).await??;

    assert_eq!(report.state, TerminalState::Failed);
    assert_eq!(executor.state(), RunState::Finished);
    let producer = report.instance("producer-0").expect("producer report");
    assert_eq!(producer.status, InstanceStatus::Aborted);
    assert_eq!(producer.sent, Some(0));
    Ok(())
}

#[tokio::test]
async fn sequential_failure_skips_later_workloads() -> Result<()> {
    let fixture = Fixture::start()?;
    fixture.broker.set_faults(BrokerFaults::none().with_fail_sends_after(5));
    let executor = fixture.executor(&fixture.single_pair(
        false,
        json!({ "messagesToSend": 10, "sendBlocking": true }),
        json!({ "messagesToReceive": 10 }),
    ))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Failed);
    assert_eq!(report.instance("producer-0").and_then(|p| p.sent), Some(5));
    let consumer = report.instance("consumer-0").expect("consumer report");
    assert_eq!(consumer.status, InstanceStatus::NotStarted);
    assert_eq!(consumer.received, Some(0));
    assert_eq!(consumer.started, None);
    Ok(())
}

#[tokio::test]
async fn refused_connection_fails_the_run() -> Result<()> {
    let fixture = Fixture::start()?;
    fixture.broker.set_faults(BrokerFaults::none().with_rejected_connections());
    let executor = fixture.executor(&fixture.single_pair(
        true,
        json!({ "messagesToSend": 10 }),
        json!({ "messagesToReceive": 10 }),
    ))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Failed);
    assert!(report.instances.iter().any(|i| i.status == InstanceStatus::Failed));
    assert_eq!(report.total_sent(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_topic_is_rejected_before_any_workload_starts() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&json!({
        "config": { "bootstrap.servers": fixture.address },
        "producers": { "instances": [{ "messagesToSend": 10 }] },
        "consumers": { "config": { "group.id": "bar" }, "instances": [{ "messagesToReceive": 10 }] }
    }))?;

    let err = executor.run().await.expect_err("profile without a topic must be rejected");

    assert!(matches!(err, PerfError::Configuration { ref scope, .. } if scope == "producer-0"));
    assert_eq!(executor.state(), RunState::Finished);
    assert_eq!(fixture.broker.stats().messages_appended, 0);
    assert_eq!(fixture.broker.stats().open_clients, 0);
    Ok(())
}

#[tokio::test]
async fn missing_group_id_is_rejected() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&json!({
        "config": { "bootstrap.servers": fixture.address },
        "topic": "foo",
        "consumers": { "instances": [{ "messagesToReceive": 10 }] }
    }))?;

    let err = executor.run().await.expect_err("consumer without group.id must be rejected");
    assert!(err.is_configuration());
    Ok(())
}

#[tokio::test]
async fn executor_runs_only_once() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&json!({
        "config": { "bootstrap.servers": fixture.address },
        "topic": "foo",
        "producers": { "instances": [{ "messagesToSend": 1 }] }
    }))?;

    assert!(executor.run().await?.is_completed());
    assert!(executor.run().await.is_err());
    Ok(())
}

#[tokio::test]
async fn empty_profile_completes_immediately() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&json!({}))?;

    let report = executor.run().await?;

    assert_eq!(report.state, TerminalState::Completed);
    assert!(report.instances.is_empty());
    Ok(())
}

#[tokio::test]
async fn report_renders_in_both_formats() -> Result<()> {
    let fixture = Fixture::start()?;
    let executor = fixture.executor(&fixture.single_pair(
        true,
        json!({ "messagesToSend": 50 }),
        json!({ "messagesToReceive": 50 }),
    ))?;
    let report = executor.run().await?;

    let human = ReportFormat::Human.reporter().render_to_string(&report);
    assert!(human.starts_with("run completed"));
    assert!(human.contains("consumer-0 kind=consumer topic=foo received=50"));

    let rendered = ReportFormat::Json.reporter().render_to_string(&report);
    let json: Value = serde_json::from_str(&rendered)?;
    assert_eq!(json["state"], json!("completed"));
    assert_eq!(json["instances"][0]["sent"], json!(50));
    Ok(())
}
