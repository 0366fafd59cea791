//! # flowkafka-connect
//!
//! Connector layer between a visual flow-programming host and a
//! Kafka-compatible broker. The host declares broker options, consumer
//! subscriptions and producer specs; this crate turns them into running
//! sessions with decoded message channels, a control protocol and status
//! reporting.
//!
//! ## Architecture
//!
//! ```text
//! BrokerConfig ──▶ BrokerHandle (shared, validated, no I/O)
//!                     │
//!        ┌────────────┴─────────────┐
//!        ▼                          ▼
//! ConsumerSession             ProducerSession
//!  messages / failures /       deliveries / failures /
//!  status outputs              status outputs
//!        ▲
//!        │ control channel (pause / resume / seek / commit)
//! ```
//!
//! Sessions never talk to the network themselves; they drive a
//! [`broker::BrokerClient`] implementation supplied at handle
//! construction. [`testing::MockBroker`] provides a scriptable in-memory
//! implementation for tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flowkafka_connect::broker::BrokerHandle;
//! use flowkafka_connect::config::{BrokerConfig, SubscriptionSpec};
//! use flowkafka_connect::consumer::ConsumerSession;
//! use flowkafka_connect::testing::MockBroker;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let handle = BrokerHandle::build(BrokerConfig::default(), Arc::new(MockBroker::new()))?;
//! let spec = SubscriptionSpec {
//!     topic: "orders".into(),
//!     group_id: "flow-orders".into(),
//!     from_beginning: true,
//!     key_kind: Default::default(),
//!     value_kind: Default::default(),
//!     tuning: None,
//! };
//!
//! let (mut session, mut outputs) = ConsumerSession::new(handle, spec);
//! session.init().await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod control;
pub mod error;
pub mod producer;
pub mod telemetry;
pub mod testing;
pub mod types;

pub use broker::{BrokerClient, BrokerConsumer, BrokerError, BrokerHandle, BrokerProducer};
pub use codec::{Payload, PayloadKind};
pub use config::{BrokerConfig, ConnectConfig, ProducerSpec, SubscriptionSpec};
pub use consumer::{ConsumerOutputs, ConsumerSession};
pub use control::{ControlCommand, ControlMessage};
pub use error::{ConnectError, Result, SessionStatus};
pub use producer::{ProducerOutputs, ProducerSession};
pub use types::{
    CommitRecord, FailedInbound, FailedOutbound, InboundMessage, OutboundMessage, StatusReport,
};

/// Commonly used imports for connector hosts
pub mod prelude {
    pub use crate::broker::{BrokerClient, BrokerHandle};
    pub use crate::codec::{Payload, PayloadKind};
    pub use crate::config::{BrokerConfig, ConnectConfig, ProducerSpec, SubscriptionSpec};
    pub use crate::consumer::ConsumerSession;
    pub use crate::control::ControlMessage;
    pub use crate::error::{ConnectError, Result, SessionStatus};
    pub use crate::producer::ProducerSession;
    pub use crate::types::{InboundMessage, OutboundMessage};
}
