//! Producer session lifecycle
//!
//! A `ProducerSession` owns one broker-side producer. Sends are gated on
//! readiness: before init, after a failed init, or with an empty payload
//! a send is a logged no-op, never an error. Each accepted send merges
//! the per-call fields with the session defaults (a set default wins),
//! encodes key and value per the configured kinds, and either echoes the
//! input on the delivery output or routes it to the error output with the
//! broker's failure cause.

use crate::broker::{BrokerHandle, BrokerProducer, ProducerRecord};
use crate::codec::{self, Payload};
use crate::config::ProducerSpec;
use crate::error::{ConnectError, Result, SessionStatus};
use crate::types::{FailedOutbound, OutboundMessage, StatusReport};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

const OUTPUT_BUFFER: usize = 64;

/// Receiving ends of a producer session's outputs
pub struct ProducerOutputs {
    /// Successfully delivered messages, echoed as accepted
    pub deliveries: mpsc::Receiver<OutboundMessage>,
    /// Rejected sends, with the failure cause
    pub failures: mpsc::Receiver<FailedOutbound>,
    /// Latest status report
    pub status: watch::Receiver<StatusReport>,
}

/// One publisher bound to a shared broker handle
pub struct ProducerSession {
    broker: BrokerHandle,
    spec: ProducerSpec,
    producer: Option<Box<dyn BrokerProducer>>,
    ready: bool,
    status_tx: watch::Sender<StatusReport>,
    out_tx: mpsc::Sender<OutboundMessage>,
    err_tx: mpsc::Sender<FailedOutbound>,
}

impl ProducerSession {
    /// Create a session and its output channels. Nothing touches the
    /// broker until [`init`](Self::init) is called.
    pub fn new(broker: BrokerHandle, spec: ProducerSpec) -> (Self, ProducerOutputs) {
        let (out_tx, deliveries) = mpsc::channel(OUTPUT_BUFFER);
        let (err_tx, failures) = mpsc::channel(OUTPUT_BUFFER);
        let (status_tx, status) = watch::channel(StatusReport::default());

        let session = Self {
            broker,
            spec,
            producer: None,
            ready: false,
            status_tx,
            out_tx,
            err_tx,
        };

        (
            session,
            ProducerOutputs {
                deliveries,
                failures,
                status,
            },
        )
    }

    /// Connect the broker-side producer. On failure the session reports
    /// an error status and every later send stays a no-op.
    pub async fn init(&mut self) -> Result<()> {
        self.set_status(SessionStatus::Initializing, "Initializing");
        info!(acks = ?self.spec.acks, "Initializing producer session");

        let mut producer = match self.broker.producer(&self.spec).await {
            Ok(producer) => producer,
            Err(e) => return Err(self.init_failed(e)),
        };
        if let Err(e) = producer.connect().await {
            return Err(self.init_failed(e));
        }

        self.producer = Some(producer);
        self.ready = true;
        self.set_status(SessionStatus::Ready, "Ready");
        Ok(())
    }

    /// Send one message.
    ///
    /// Not ready or empty payload: logged no-op. No resolvable topic
    /// (neither a session default nor a per-call value): the message is
    /// routed to the error output without any broker call. Broker
    /// rejection: the message is routed to the error output and the
    /// session stays ready for the next send.
    pub async fn send(&mut self, message: OutboundMessage) -> Result<()> {
        if !self.ready || message.payload.is_empty() {
            debug!("Send skipped: session not ready or payload empty");
            return Ok(());
        }

        let topic = match self
            .spec
            .defaults
            .topic
            .clone()
            .or_else(|| message.topic.clone())
        {
            Some(topic) => topic,
            None => {
                let error = "no topic configured or supplied".to_string();
                self.set_status(SessionStatus::Error, "Error");
                let _ = self
                    .err_tx
                    .send(FailedOutbound {
                        message,
                        error: error.clone(),
                    })
                    .await;
                return Err(ConnectError::Send(error));
            }
        };

        let key = match &self.spec.defaults.key {
            Some(key) => Some(Payload::Text(key.clone())),
            None => message.key.clone(),
        };
        let partition = self.spec.defaults.partition.or(message.partition);
        let headers = if self.spec.defaults.headers.is_empty() {
            message.headers.clone()
        } else {
            Some(self.spec.defaults.headers.clone())
        };

        let record = ProducerRecord {
            topic,
            partition,
            key: key.map(|k| codec::encode(k, self.spec.key_kind)),
            headers: headers.as_ref().map(codec::encode_headers),
            value: codec::encode(message.payload.clone(), self.spec.value_kind),
        };

        self.set_status(SessionStatus::Ready, "Sending");
        let producer = self.producer.as_mut().ok_or(ConnectError::NotInitialized)?;
        match producer.send(record).await {
            Ok(()) => {
                self.set_status(SessionStatus::Ready, "Sent");
                let _ = self.out_tx.send(message).await;
                Ok(())
            }
            Err(e) => {
                self.set_status(SessionStatus::Error, "Error");
                let error = e.to_string();
                let _ = self.err_tx.send(FailedOutbound { message, error }).await;
                Err(ConnectError::send(e))
            }
        }
    }

    /// Disconnect the broker-side producer. Closing a session that was
    /// never initialized just reports the terminal status.
    pub async fn close(&mut self) -> Result<()> {
        self.ready = false;
        let Some(mut producer) = self.producer.take() else {
            self.set_status(SessionStatus::Disconnected, "Disconnected");
            return Ok(());
        };

        match producer.disconnect().await {
            Ok(()) => {
                self.set_status(SessionStatus::Disconnected, "Disconnected");
                Ok(())
            }
            Err(e) => {
                self.producer = Some(producer);
                Err(e.into())
            }
        }
    }

    /// Whether sends will currently reach the broker
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Current status tag
    pub fn status(&self) -> SessionStatus {
        self.status_tx.borrow().status
    }

    fn init_failed(&mut self, e: impl std::fmt::Display) -> ConnectError {
        self.ready = false;
        self.set_status(SessionStatus::Error, "Init error");
        ConnectError::init(e)
    }

    fn set_status(&self, status: SessionStatus, text: &str) {
        self.status_tx.send_replace(StatusReport::new(status, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PayloadKind;
    use crate::config::{BrokerConfig, SendDefaults};
    use crate::testing::{BrokerCall, MockBroker};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::mpsc::error::TryRecvError;

    fn handle(broker: &MockBroker) -> BrokerHandle {
        BrokerHandle::build(BrokerConfig::default(), Arc::new(broker.clone())).unwrap()
    }

    fn spec_with_defaults(defaults: SendDefaults) -> ProducerSpec {
        ProducerSpec {
            value_kind: PayloadKind::Json,
            defaults,
            ..ProducerSpec::default()
        }
    }

    fn message(value: Payload) -> OutboundMessage {
        OutboundMessage {
            payload: value,
            ..OutboundMessage::default()
        }
    }

    #[tokio::test]
    async fn test_send_before_init_is_a_noop() {
        let broker = MockBroker::new();
        let (mut session, mut outputs) =
            ProducerSession::new(handle(&broker), ProducerSpec::default());

        session.send(message("hello".into())).await.unwrap();

        assert!(broker.calls().is_empty());
        assert_eq!(outputs.deliveries.try_recv(), Err(TryRecvError::Empty));
        assert!(matches!(
            outputs.failures.try_recv(),
            Err(TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_noop() {
        let broker = MockBroker::new();
        let defaults = SendDefaults {
            topic: Some("audit".into()),
            ..SendDefaults::default()
        };
        let (mut session, _outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(defaults));
        session.init().await.unwrap();

        session.send(message(Payload::default())).await.unwrap();
        session
            .send(message(Payload::Json(serde_json::Value::Null)))
            .await
            .unwrap();

        assert!(broker.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_encodes_and_echoes() {
        let broker = MockBroker::new();
        let defaults = SendDefaults {
            topic: Some("audit".into()),
            ..SendDefaults::default()
        };
        let (mut session, mut outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(defaults));
        session.init().await.unwrap();

        let msg = message(Payload::Json(json!({"action": "login"})));
        session.send(msg.clone()).await.unwrap();

        let sent = broker.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "audit");
        assert_eq!(&sent[0].value[..], br#"{"action":"login"}"#);

        // the accepted input is echoed unmodified
        assert_eq!(outputs.deliveries.recv().await.unwrap(), msg);
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(outputs.status.borrow().text, "Sent");
    }

    #[tokio::test]
    async fn test_session_defaults_win_over_per_call_values() {
        let broker = MockBroker::new();
        let defaults = SendDefaults {
            topic: Some("audit".into()),
            partition: Some(2),
            key: Some("fixed-key".into()),
            headers: HashMap::from([("origin".to_string(), "flow".to_string())]),
        };
        let (mut session, _outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(defaults));
        session.init().await.unwrap();

        session
            .send(OutboundMessage {
                payload: Payload::Json(json!(1)),
                key: Some("call-key".into()),
                topic: Some("other".into()),
                partition: Some(9),
                headers: Some(HashMap::from([("x".to_string(), "y".to_string())])),
            })
            .await
            .unwrap();

        let sent = broker.sent();
        assert_eq!(sent[0].topic, "audit");
        assert_eq!(sent[0].partition, Some(2));
        assert_eq!(sent[0].key.as_deref(), Some(&b"fixed-key"[..]));
        assert_eq!(
            sent[0].headers.as_ref().unwrap()["origin"],
            bytes::Bytes::from_static(b"flow")
        );
    }

    #[tokio::test]
    async fn test_per_call_values_used_when_defaults_unset() {
        let broker = MockBroker::new();
        let (mut session, _outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(SendDefaults::default()));
        session.init().await.unwrap();

        session
            .send(OutboundMessage {
                payload: Payload::Json(json!(1)),
                key: Some("call-key".into()),
                topic: Some("events".into()),
                partition: Some(4),
                headers: None,
            })
            .await
            .unwrap();

        let sent = broker.sent();
        assert_eq!(sent[0].topic, "events");
        assert_eq!(sent[0].partition, Some(4));
        assert_eq!(sent[0].key.as_deref(), Some(&b"call-key"[..]));
        assert_eq!(sent[0].headers, None);
    }

    #[tokio::test]
    async fn test_no_topic_routes_to_error_output() {
        let broker = MockBroker::new();
        let (mut session, mut outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(SendDefaults::default()));
        session.init().await.unwrap();

        let err = session.send(message("orphan".into())).await.unwrap_err();
        assert!(matches!(err, ConnectError::Send(_)));

        let failed = outputs.failures.recv().await.unwrap();
        assert_eq!(failed.message.payload, Payload::Text("orphan".into()));
        assert!(broker.sent().is_empty());
    }

    #[tokio::test]
    async fn test_broker_rejection_keeps_session_ready() {
        let broker = MockBroker::new().fail_on("send", "message too large");
        let defaults = SendDefaults {
            topic: Some("audit".into()),
            ..SendDefaults::default()
        };
        let (mut session, mut outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(defaults));
        session.init().await.unwrap();

        let err = session.send(message("payload".into())).await.unwrap_err();
        assert!(matches!(err, ConnectError::Send(_)));

        let failed = outputs.failures.recv().await.unwrap();
        assert!(failed.error.contains("message too large"));
        // the session accepts further sends after a rejection
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn test_init_failure_gates_later_sends() {
        let broker = MockBroker::new().fail_on("connect", "refused");
        let defaults = SendDefaults {
            topic: Some("audit".into()),
            ..SendDefaults::default()
        };
        let (mut session, _outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(defaults));

        assert!(session.init().await.is_err());
        assert_eq!(session.status(), SessionStatus::Error);

        session.send(message("dropped".into())).await.unwrap();
        assert!(broker.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_disconnects_and_gates_sends() {
        let broker = MockBroker::new();
        let defaults = SendDefaults {
            topic: Some("audit".into()),
            ..SendDefaults::default()
        };
        let (mut session, _outputs) =
            ProducerSession::new(handle(&broker), spec_with_defaults(defaults));
        session.init().await.unwrap();

        session.close().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Disconnected);

        session.send(message("late".into())).await.unwrap();
        assert!(broker.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_uninitialized_session() {
        let broker = MockBroker::new();
        let (mut session, _outputs) =
            ProducerSession::new(handle(&broker), ProducerSpec::default());

        session.close().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(broker.calls().is_empty());
    }
}
