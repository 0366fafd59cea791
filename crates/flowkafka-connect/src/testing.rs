//! Testing utilities
//!
//! `MockBroker` implements the broker client capability without any
//! network: it records every call, replays scripted records through the
//! consumer stream, and injects failures per operation. Unit and
//! integration tests drive full session lifecycles against it.
//!
//! # Example
//!
//! ```rust,ignore
//! let broker = MockBroker::new()
//!     .with_records(vec![record("t", 0, 5, b"k", b"{\"id\":1}")])
//!     .fail_on("commit", "coordinator not available");
//! ```

use crate::broker::{
    BrokerClient, BrokerConsumer, BrokerError, BrokerProducer, BrokerResult, ConsumerRecord,
    ProducerRecord,
};
use crate::config::{ProducerSpec, SubscriptionSpec};
use crate::types::CommitRecord;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One recorded broker interaction
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    CreateConsumer { topic: String, group_id: String },
    CreateProducer,
    Connect,
    Subscribe(String),
    Pause(String),
    Resume(String),
    Seek {
        topic: String,
        partition: i32,
        offset: String,
    },
    Commit(Vec<CommitRecord>),
    Send(ProducerRecord),
    Disconnect,
}

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<BrokerCall>>,
    records: Mutex<Vec<ConsumerRecord>>,
    failures: Mutex<HashMap<String, String>>,
    keep_stream_open: Mutex<bool>,
}

impl MockState {
    fn record(&self, call: BrokerCall) {
        self.calls.lock().push(call);
    }

    fn check(&self, op: &str) -> BrokerResult<()> {
        match self.failures.lock().get(op) {
            Some(msg) if op == "connect" || op == "create_consumer" || op == "create_producer" => {
                Err(BrokerError::connection(msg.clone()))
            }
            Some(msg) => Err(BrokerError::rejected(msg.clone())),
            None => Ok(()),
        }
    }
}

/// A scriptable in-memory broker client
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<MockState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the records the consumer stream will deliver, in order
    pub fn with_records(self, records: Vec<ConsumerRecord>) -> Self {
        *self.state.records.lock() = records;
        self
    }

    /// Keep the record stream pending after the scripted records are
    /// drained instead of ending it, so a run loop stays alive until it
    /// is shut down externally
    pub fn with_open_stream(self) -> Self {
        *self.state.keep_stream_open.lock() = true;
        self
    }

    /// Make one operation fail. Operation names: `create_consumer`,
    /// `create_producer`, `connect`, `subscribe`, `pause`, `resume`,
    /// `seek`, `commit`, `send`, `disconnect`.
    pub fn fail_on(self, op: &str, message: &str) -> Self {
        self.state
            .failures
            .lock()
            .insert(op.to_string(), message.to_string());
        self
    }

    /// Everything the sessions asked the broker to do, in order
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.state.calls.lock().clone()
    }

    /// Just the committed offset batches
    pub fn commits(&self) -> Vec<Vec<CommitRecord>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BrokerCall::Commit(commits) => Some(commits),
                _ => None,
            })
            .collect()
    }

    /// Just the produced records
    pub fn sent(&self) -> Vec<ProducerRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BrokerCall::Send(record) => Some(record),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn consumer(&self, spec: &SubscriptionSpec) -> BrokerResult<Box<dyn BrokerConsumer>> {
        self.state.check("create_consumer")?;
        self.state.record(BrokerCall::CreateConsumer {
            topic: spec.topic.clone(),
            group_id: spec.group_id.clone(),
        });
        Ok(Box::new(MockConsumer {
            state: self.state.clone(),
        }))
    }

    async fn producer(&self, _spec: &ProducerSpec) -> BrokerResult<Box<dyn BrokerProducer>> {
        self.state.check("create_producer")?;
        self.state.record(BrokerCall::CreateProducer);
        Ok(Box::new(MockProducer {
            state: self.state.clone(),
        }))
    }
}

struct MockConsumer {
    state: Arc<MockState>,
}

#[async_trait]
impl BrokerConsumer for MockConsumer {
    async fn connect(&mut self) -> BrokerResult<()> {
        self.state.check("connect")?;
        self.state.record(BrokerCall::Connect);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> BrokerResult<()> {
        self.state.check("subscribe")?;
        self.state.record(BrokerCall::Subscribe(topic.to_string()));
        Ok(())
    }

    fn records(&mut self) -> BoxStream<'static, BrokerResult<ConsumerRecord>> {
        let records: Vec<_> = std::mem::take(&mut *self.state.records.lock());
        let scripted = stream::iter(records.into_iter().map(Ok));
        if *self.state.keep_stream_open.lock() {
            Box::pin(scripted.chain(stream::pending()))
        } else {
            Box::pin(scripted)
        }
    }

    async fn pause(&mut self, topic: &str) -> BrokerResult<()> {
        self.state.check("pause")?;
        self.state.record(BrokerCall::Pause(topic.to_string()));
        Ok(())
    }

    async fn resume(&mut self, topic: &str) -> BrokerResult<()> {
        self.state.check("resume")?;
        self.state.record(BrokerCall::Resume(topic.to_string()));
        Ok(())
    }

    async fn seek(&mut self, topic: &str, partition: i32, offset: &str) -> BrokerResult<()> {
        self.state.check("seek")?;
        self.state.record(BrokerCall::Seek {
            topic: topic.to_string(),
            partition,
            offset: offset.to_string(),
        });
        Ok(())
    }

    async fn commit_offsets(&mut self, commits: &[CommitRecord]) -> BrokerResult<()> {
        self.state.check("commit")?;
        self.state.record(BrokerCall::Commit(commits.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> BrokerResult<()> {
        self.state.check("disconnect")?;
        self.state.record(BrokerCall::Disconnect);
        Ok(())
    }
}

struct MockProducer {
    state: Arc<MockState>,
}

#[async_trait]
impl BrokerProducer for MockProducer {
    async fn connect(&mut self) -> BrokerResult<()> {
        self.state.check("connect")?;
        self.state.record(BrokerCall::Connect);
        Ok(())
    }

    async fn send(&mut self, record: ProducerRecord) -> BrokerResult<()> {
        self.state.check("send")?;
        self.state.record(BrokerCall::Send(record));
        Ok(())
    }

    async fn disconnect(&mut self) -> BrokerResult<()> {
        self.state.check("disconnect")?;
        self.state.record(BrokerCall::Disconnect);
        Ok(())
    }
}

/// Build a consumer record with UTF-8 key/value, for test scripts
pub fn record(topic: &str, partition: i32, offset: u64, key: &[u8], value: &[u8]) -> ConsumerRecord {
    ConsumerRecord {
        topic: topic.to_string(),
        partition,
        offset,
        key: if key.is_empty() {
            None
        } else {
            Some(bytes::Bytes::copy_from_slice(key))
        },
        value: if value.is_empty() {
            None
        } else {
            Some(bytes::Bytes::copy_from_slice(value))
        },
        headers: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubscriptionSpec;

    fn spec() -> SubscriptionSpec {
        SubscriptionSpec {
            topic: "t".into(),
            group_id: "g".into(),
            from_beginning: false,
            key_kind: Default::default(),
            value_kind: Default::default(),
            tuning: None,
        }
    }

    #[tokio::test]
    async fn test_mock_records_calls_in_order() {
        let broker = MockBroker::new();
        let mut consumer = broker.consumer(&spec()).await.unwrap();
        consumer.connect().await.unwrap();
        consumer.subscribe("t").await.unwrap();

        assert_eq!(
            broker.calls(),
            vec![
                BrokerCall::CreateConsumer {
                    topic: "t".into(),
                    group_id: "g".into()
                },
                BrokerCall::Connect,
                BrokerCall::Subscribe("t".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let broker = MockBroker::new().fail_on("connect", "refused");
        let mut consumer = broker.consumer(&spec()).await.unwrap();
        let err = consumer.connect().await.unwrap_err();
        assert!(matches!(err, BrokerError::Connection(_)));
        // the failed call is not recorded
        assert_eq!(broker.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_records_are_drained() {
        let broker = MockBroker::new().with_records(vec![record("t", 0, 1, b"k", b"v")]);
        let mut consumer = broker.consumer(&spec()).await.unwrap();
        let delivered: Vec<_> = consumer.records().collect().await;
        assert_eq!(delivered.len(), 1);
    }
}
