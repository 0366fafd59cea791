//! Inbound control protocol for consumer sessions
//!
//! Upstream flow components steer a running consumer with control
//! messages tagged by an `event` field. Recognized events map onto
//! session operations; anything else is ignored without error so newer
//! message shapes from upstream never break an older session.

use crate::error::{ConnectError, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// A control message as delivered by the host: `{ payload: { event, .. } }`
#[derive(Debug, Clone, Deserialize)]
pub struct ControlMessage {
    pub payload: ControlPayload,
}

/// The control payload. `partition` and `offset` stay loosely typed here;
/// the session validates them per-operation so a malformed seek rejects
/// only that seek.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlPayload {
    pub event: String,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub partition: Option<Value>,

    #[serde(default)]
    pub offset: Option<Value>,
}

/// Dispatch target for one control message
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Seek {
        partition: Option<Value>,
        offset: Option<Value>,
    },
    Commit {
        topic: Option<String>,
        partition: Option<Value>,
        offset: Option<Value>,
    },
    /// Unrecognized event tag; a deliberate no-op for forward
    /// compatibility
    Ignored(String),
}

impl ControlMessage {
    /// Parse a raw host message. A shape that cannot be parsed at all
    /// rejects only that message; the control channel stays usable.
    pub fn parse(raw: Value) -> Result<Self> {
        serde_json::from_value(raw).map_err(|e| ConnectError::InvalidControl(e.to_string()))
    }

    /// Route the `event` tag to a session operation
    pub fn command(self) -> ControlCommand {
        let payload = self.payload;
        match payload.event.as_str() {
            "pause" => ControlCommand::Pause,
            "resume" => ControlCommand::Resume,
            "seek" => ControlCommand::Seek {
                partition: payload.partition,
                offset: payload.offset,
            },
            "commit" => ControlCommand::Commit {
                topic: payload.topic,
                partition: payload.partition,
                offset: payload.offset,
            },
            other => {
                debug!("Ignoring unrecognized control event '{}'", other);
                ControlCommand::Ignored(payload.event)
            }
        }
    }
}

/// Parse a loosely-typed offset: a non-negative JSON number or a numeric
/// string
pub(crate) fn numeric_offset(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Parse a loosely-typed partition: a non-negative JSON number or a
/// numeric string
pub(crate) fn numeric_partition(value: Option<&Value>) -> Option<i32> {
    let n = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    if n < 0 {
        return None;
    }
    i32::try_from(n).ok()
}
