//! Shared message and session types
//!
//! These are the shapes that cross the boundary between sessions and the
//! flow host: decoded inbound messages, outbound send requests, the
//! per-session commit record, and the diagnostic status report.

use crate::codec::Payload;
use crate::error::SessionStatus;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The last offset successfully committed by a consumer session.
///
/// `offset` holds the value actually sent to the broker, i.e. the *next*
/// position to read (accepted offset + 1). A later commit request is
/// accepted only if this recorded offset is not strictly greater than the
/// requested one; the committed position never moves backward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub topic: String,
    pub partition: i32,
    /// Non-negative integer, kept as a string per broker convention
    pub offset: String,
}

/// Position metadata attached to every inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    pub topic: String,
    pub partition: i32,
    pub offset: String,
}

/// A decoded record leaving the consumer session on its primary output
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub payload: InboundPayload,
    pub meta: MessageMeta,
}

/// Decoded key/value/headers of an inbound record.
///
/// An absent header set and a present-but-empty one both decode to `None`;
/// downstream never sees a misleading empty map.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPayload {
    pub key: Option<Payload>,
    pub value: Option<Payload>,
    pub headers: Option<HashMap<String, String>>,
}

/// A message the consumer session failed to handle, routed to the error
/// output together with whatever was decoded before the failure
#[derive(Debug, Clone)]
pub struct FailedInbound {
    pub message: InboundMessage,
    pub error: String,
}

/// A send request entering the producer session.
///
/// Per-call `topic`/`partition`/`key`/`headers` are merged with the
/// session defaults; the session default wins unless it is unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundMessage {
    pub payload: Payload,
    pub key: Option<Payload>,
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub headers: Option<HashMap<String, String>>,
}

/// A send that the broker rejected, echoed on the producer error output
/// so the host can apply its own retry/alerting policy
#[derive(Debug, Clone)]
pub struct FailedOutbound {
    pub message: OutboundMessage,
    pub error: String,
}

/// Status tag plus short text, published on every meaningful transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub status: SessionStatus,
    pub text: String,
}

impl StatusReport {
    pub fn new(status: SessionStatus, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }
}

/// A wrapper around `SecretString` for credentials in configuration.
///
/// Redacts the value in `Debug`/`Display` output and serializes as
/// `"***REDACTED***"` so config dumps never leak secrets.
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value. Use only at the point of authentication.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_string_redacted() {
        let secret = SensitiveString::new("sasl-password");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "sasl-password");
    }

    #[test]
    fn test_sensitive_string_serde() {
        let secret = SensitiveString::new("sasl-password");
        let serialized = serde_json::to_string(&secret).unwrap();
        assert_eq!(serialized, "\"***REDACTED***\"");

        let parsed: SensitiveString = serde_json::from_str("\"from-config\"").unwrap();
        assert_eq!(parsed.expose_secret(), "from-config");
    }

    #[test]
    fn test_status_report() {
        let report = StatusReport::new(SessionStatus::Ready, "Ready");
        assert_eq!(report.status, SessionStatus::Ready);
        assert_eq!(report.text, "Ready");
    }
}
