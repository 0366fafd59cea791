//! Broker client capability and the shared connection handle
//!
//! The underlying wire protocol driver is an external collaborator. This
//! module defines the capability traits the sessions program against
//! (`BrokerClient`, `BrokerConsumer`, `BrokerProducer`) and the
//! `BrokerHandle` built once from a validated `BrokerConfig` and shared
//! by every session derived from it. Building a handle performs no
//! network I/O; nothing touches the network until a session connects.

use crate::config::{BrokerConfig, ProducerSpec, SubscriptionSpec};
use crate::error::Result;
use crate::types::CommitRecord;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error reported by the broker client capability
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("broker rejected request: {0}")]
    Rejected(String),

    #[error("request timed out: {0}")]
    Timeout(String),
}

impl BrokerError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Result type for broker client operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// One record as delivered by the broker client.
///
/// Records arrive in per-partition order; no cross-partition ordering is
/// guaranteed or assumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: u64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub headers: Option<HashMap<String, Bytes>>,
}

/// One record handed to the broker client for production
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub key: Option<Bytes>,
    pub headers: Option<HashMap<String, Bytes>>,
    pub value: Bytes,
}

/// Factory side of the broker client capability.
///
/// All consumers and producers derived from one client share whatever
/// connection-pool semantics the driver implements; that is not
/// re-specified here.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Create a broker-side consumer for one subscription
    async fn consumer(&self, spec: &SubscriptionSpec) -> BrokerResult<Box<dyn BrokerConsumer>>;

    /// Create a broker-side producer
    async fn producer(&self, spec: &ProducerSpec) -> BrokerResult<Box<dyn BrokerProducer>>;
}

/// Broker-side consumer instance. Every operation is asynchronous and
/// may fail; ordering of delivered records is per-partition only.
#[async_trait]
pub trait BrokerConsumer: Send {
    async fn connect(&mut self) -> BrokerResult<()>;

    async fn subscribe(&mut self, topic: &str) -> BrokerResult<()>;

    /// The inbound record stream. Replaces a callback-style run loop:
    /// the session owns the loop and polls this stream.
    fn records(&mut self) -> BoxStream<'static, BrokerResult<ConsumerRecord>>;

    async fn pause(&mut self, topic: &str) -> BrokerResult<()>;

    async fn resume(&mut self, topic: &str) -> BrokerResult<()>;

    /// Reposition the consumer. Offset range validation against actual
    /// log bounds is the driver's responsibility and surfaces as an
    /// asynchronous failure, not here.
    async fn seek(&mut self, topic: &str, partition: i32, offset: &str) -> BrokerResult<()>;

    async fn commit_offsets(&mut self, commits: &[CommitRecord]) -> BrokerResult<()>;

    async fn disconnect(&mut self) -> BrokerResult<()>;
}

/// Broker-side producer instance
#[async_trait]
pub trait BrokerProducer: Send {
    async fn connect(&mut self) -> BrokerResult<()>;

    async fn send(&mut self, record: ProducerRecord) -> BrokerResult<()>;

    async fn disconnect(&mut self) -> BrokerResult<()>;
}

/// Shared, reusable broker handle built once from declarative options.
///
/// Cloning is cheap; every session derived from the same handle shares
/// the same configuration and underlying client.
#[derive(Clone)]
pub struct BrokerHandle {
    config: Arc<BrokerConfig>,
    client: Arc<dyn BrokerClient>,
}

impl BrokerHandle {
    /// Validate the configuration and wrap the broker client driver.
    ///
    /// Fails with a config error when the declared security mode is
    /// incomplete. No network I/O happens here.
    pub fn build(config: BrokerConfig, client: Arc<dyn BrokerClient>) -> Result<Self> {
        config.validate()?;
        debug!(
            client_id = %config.client_id,
            servers = ?config.bootstrap_servers,
            "Broker handle built"
        );
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// The configuration this handle was built from
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub(crate) async fn consumer(
        &self,
        spec: &SubscriptionSpec,
    ) -> BrokerResult<Box<dyn BrokerConsumer>> {
        self.client.consumer(spec).await
    }

    pub(crate) async fn producer(
        &self,
        spec: &ProducerSpec,
    ) -> BrokerResult<Box<dyn BrokerProducer>> {
        self.client.producer(spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::error::ConnectError;
    use crate::testing::MockBroker;

    fn base_config() -> BrokerConfig {
        BrokerConfig {
            bootstrap_servers: vec!["localhost:9092".into()],
            client_id: "test".into(),
            log_level: Default::default(),
            connection_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
            retry: None,
            security: SecurityConfig::None,
        }
    }

    #[test]
    fn test_build_validates_security() {
        let mut config = base_config();
        config.security = SecurityConfig::Tls {
            ca: None,
            cert: None,
            key: None,
            passphrase: None,
        };

        let result = BrokerHandle::build(config, Arc::new(MockBroker::new()));
        assert!(matches!(result, Err(ConnectError::Config(_))));
    }

    #[test]
    fn test_handle_is_shared() {
        let handle = BrokerHandle::build(base_config(), Arc::new(MockBroker::new())).unwrap();
        let clone = handle.clone();
        assert_eq!(
            clone.config().bootstrap_servers,
            handle.config().bootstrap_servers
        );
    }
}
