//! Consumer session lifecycle
//!
//! A `ConsumerSession` owns one broker-side consumer for one
//! subscription. It is driven two ways at once: the broker delivers a
//! record stream, and the host steers the session through a control
//! channel (pause, resume, seek, commit). Decoded records leave on the
//! primary output, messages that could not be handled leave on the error
//! output, and every meaningful state transition is published on a watch
//! channel for host UI feedback.
//!
//! Commits are monotonic per session: a request at or behind the last
//! recorded commit is skipped with a warning instead of rewinding the
//! committed position.

use crate::broker::{BrokerConsumer, BrokerHandle, ConsumerRecord};
use crate::codec;
use crate::config::SubscriptionSpec;
use crate::control::{self, ControlCommand, ControlMessage};
use crate::error::{ConnectError, Result, SessionStatus};
use crate::types::{CommitRecord, FailedInbound, InboundMessage, InboundPayload, MessageMeta, StatusReport};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

const OUTPUT_BUFFER: usize = 64;

/// Receiving ends of a consumer session's outputs
pub struct ConsumerOutputs {
    /// Decoded inbound messages
    pub messages: mpsc::Receiver<InboundMessage>,
    /// Messages the session failed to hand off, with the failure cause
    pub failures: mpsc::Receiver<FailedInbound>,
    /// Latest status report; borrow or `changed().await` as needed
    pub status: watch::Receiver<StatusReport>,
}

/// One consumer subscription bound to a shared broker handle
pub struct ConsumerSession {
    broker: BrokerHandle,
    spec: SubscriptionSpec,
    consumer: Option<Box<dyn BrokerConsumer>>,
    last_committed: Option<CommitRecord>,
    status_tx: watch::Sender<StatusReport>,
    out_tx: mpsc::Sender<InboundMessage>,
    err_tx: mpsc::Sender<FailedInbound>,
}

impl ConsumerSession {
    /// Create a session and its output channels. Nothing touches the
    /// broker until [`init`](Self::init) is called.
    pub fn new(broker: BrokerHandle, spec: SubscriptionSpec) -> (Self, ConsumerOutputs) {
        let (out_tx, messages) = mpsc::channel(OUTPUT_BUFFER);
        let (err_tx, failures) = mpsc::channel(OUTPUT_BUFFER);
        let (status_tx, status) = watch::channel(StatusReport::default());

        let session = Self {
            broker,
            spec,
            consumer: None,
            last_committed: None,
            status_tx,
            out_tx,
            err_tx,
        };

        (
            session,
            ConsumerOutputs {
                messages,
                failures,
                status,
            },
        )
    }

    /// Connect and subscribe. On failure the session reports an error
    /// status and stays down; it does not retry on its own.
    pub async fn init(&mut self) -> Result<()> {
        self.set_status(SessionStatus::Initializing, "Initializing");
        info!(
            topic = %self.spec.topic,
            group_id = %self.spec.group_id,
            "Initializing consumer session"
        );

        let mut consumer = match self.broker.consumer(&self.spec).await {
            Ok(consumer) => consumer,
            Err(e) => return Err(self.init_failed(e)),
        };
        if let Err(e) = consumer.connect().await {
            return Err(self.init_failed(e));
        }
        self.set_status(SessionStatus::Ready, "Ready");
        if let Err(e) = consumer.subscribe(&self.spec.topic).await {
            return Err(self.init_failed(e));
        }

        self.consumer = Some(consumer);
        Ok(())
    }

    /// Drive the session: poll the record stream and the control channel
    /// until the stream ends, the shutdown signal fires, or an
    /// unrecoverable error occurs.
    ///
    /// Transient stream errors are logged and consumption continues;
    /// control messages that fail validation reject only that message.
    pub async fn run(
        &mut self,
        mut control: mpsc::Receiver<ControlMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let consumer = self.consumer.as_mut().ok_or(ConnectError::NotInitialized)?;
        let mut records = consumer.records();
        let mut control_open = true;

        info!(topic = %self.spec.topic, "Consumer session running");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(topic = %self.spec.topic, "Consumer session shutting down");
                    return Ok(());
                }
                cmd = control.recv(), if control_open => match cmd {
                    Some(msg) => {
                        if let Err(e) = self.handle_control(msg).await {
                            warn!(topic = %self.spec.topic, "Control message rejected: {}", e);
                        }
                    }
                    None => control_open = false,
                },
                record = records.next() => match record {
                    Some(Ok(record)) => self.on_message(record).await,
                    Some(Err(e)) => {
                        warn!(topic = %self.spec.topic, "Record stream error: {}", e);
                    }
                    None => {
                        info!(topic = %self.spec.topic, "Record stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Apply one control message to the session
    pub async fn handle_control(&mut self, msg: ControlMessage) -> Result<()> {
        match msg.command() {
            ControlCommand::Pause => self.pause().await,
            ControlCommand::Resume => self.resume().await,
            ControlCommand::Seek { partition, offset } => {
                self.seek(partition.as_ref(), offset.as_ref()).await
            }
            ControlCommand::Commit {
                topic,
                partition,
                offset,
            } => self.commit(topic, partition.as_ref(), offset.as_ref()).await,
            ControlCommand::Ignored(_) => Ok(()),
        }
    }

    /// Pause delivery for the subscribed topic. No idempotence guard:
    /// pausing twice forwards both calls to the broker.
    pub async fn pause(&mut self) -> Result<()> {
        let topic = self.spec.topic.clone();
        let consumer = self.consumer.as_mut().ok_or(ConnectError::NotInitialized)?;
        consumer.pause(&topic).await?;
        self.set_status(SessionStatus::Paused, "Paused");
        Ok(())
    }

    /// Resume delivery for the subscribed topic
    pub async fn resume(&mut self) -> Result<()> {
        let topic = self.spec.topic.clone();
        let consumer = self.consumer.as_mut().ok_or(ConnectError::NotInitialized)?;
        consumer.resume(&topic).await?;
        self.set_status(SessionStatus::Ready, "Resumed");
        Ok(())
    }

    /// Reposition the consumer on the subscribed topic.
    ///
    /// Both arguments must carry non-negative numeric values (numbers or
    /// numeric strings); anything else rejects the seek before any broker
    /// call. Range validation against actual log bounds is left to the
    /// broker.
    pub async fn seek(&mut self, partition: Option<&Value>, offset: Option<&Value>) -> Result<()> {
        let partition = control::numeric_partition(partition)
            .ok_or_else(|| ConnectError::invalid_seek("partition is not a non-negative number"))?;
        let offset = control::numeric_offset(offset)
            .ok_or_else(|| ConnectError::invalid_seek("offset is not a non-negative number"))?;

        let topic = self.spec.topic.clone();
        let consumer = self.consumer.as_mut().ok_or(ConnectError::NotInitialized)?;
        consumer.seek(&topic, partition, &offset.to_string()).await?;

        debug!(topic = %topic, partition, offset, "Consumer repositioned");
        self.set_status(SessionStatus::Ready, "Seeked");
        Ok(())
    }

    /// Commit an offset, monotonically.
    ///
    /// The broker receives `offset + 1` (the next position to read), and
    /// that is also what the session records. A request at or behind the
    /// recorded commit is skipped with a warning and reports success, so
    /// redelivered control messages never rewind the committed position.
    pub async fn commit(
        &mut self,
        topic: Option<String>,
        partition: Option<&Value>,
        offset: Option<&Value>,
    ) -> Result<()> {
        let partition = control::numeric_partition(partition)
            .ok_or_else(|| ConnectError::invalid_commit("partition is not a non-negative number"))?;
        let offset = control::numeric_offset(offset)
            .ok_or_else(|| ConnectError::invalid_commit("offset is not a non-negative number"))?;
        let topic = match topic.filter(|t| !t.is_empty()) {
            Some(topic) => topic,
            None => self.spec.topic.clone(),
        };

        if let Some(last) = &self.last_committed {
            if last.topic == topic && last.partition == partition {
                if let Ok(recorded) = last.offset.parse::<u64>() {
                    if recorded > offset {
                        warn!(
                            topic = %topic,
                            partition,
                            recorded,
                            requested = offset,
                            "Commit skipped: recorded offset is ahead of the request"
                        );
                        return Ok(());
                    }
                }
            }
        }

        let commit = CommitRecord {
            topic,
            partition,
            offset: (offset + 1).to_string(),
        };
        let consumer = self.consumer.as_mut().ok_or(ConnectError::NotInitialized)?;
        consumer
            .commit_offsets(std::slice::from_ref(&commit))
            .await
            .map_err(ConnectError::commit)?;

        debug!(
            topic = %commit.topic,
            partition = commit.partition,
            offset = %commit.offset,
            "Offset committed"
        );
        self.last_committed = Some(commit);
        Ok(())
    }

    /// Disconnect the broker-side consumer. Closing a session that was
    /// never initialized just reports the terminal status.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut consumer) = self.consumer.take() else {
            self.set_status(SessionStatus::Disconnected, "Disconnected");
            return Ok(());
        };

        match consumer.disconnect().await {
            Ok(()) => {
                self.set_status(SessionStatus::Disconnected, "Disconnected");
                Ok(())
            }
            Err(e) => {
                self.consumer = Some(consumer);
                Err(e.into())
            }
        }
    }

    /// The last commit sent to the broker by this session, if any
    pub fn last_committed(&self) -> Option<&CommitRecord> {
        self.last_committed.as_ref()
    }

    /// Current status tag
    pub fn status(&self) -> SessionStatus {
        self.status_tx.borrow().status
    }

    async fn on_message(&mut self, record: ConsumerRecord) {
        let message = InboundMessage {
            payload: InboundPayload {
                key: record
                    .key
                    .map(|b| codec::decode(b.into(), self.spec.key_kind)),
                value: record
                    .value
                    .map(|b| codec::decode(b.into(), self.spec.value_kind)),
                headers: codec::decode_headers(record.headers.as_ref()),
            },
            meta: MessageMeta {
                topic: record.topic,
                partition: record.partition,
                offset: record.offset.to_string(),
            },
        };

        match self.out_tx.send(message.clone()).await {
            Ok(()) => self.set_status(SessionStatus::Ready, "Message received"),
            Err(_) => {
                // primary output gone; route the message to the error
                // output with the cause instead of dropping it
                self.set_status(SessionStatus::Error, "Error");
                let _ = self
                    .err_tx
                    .send(FailedInbound {
                        message,
                        error: "primary output closed".to_string(),
                    })
                    .await;
            }
        }
    }

    fn init_failed(&mut self, e: impl std::fmt::Display) -> ConnectError {
        self.set_status(SessionStatus::Error, "Init error");
        ConnectError::init(e)
    }

    fn set_status(&self, status: SessionStatus, text: &str) {
        self.status_tx.send_replace(StatusReport::new(status, text));
    }
}
