//! Error types for flowkafka-connect
//!
//! Validation failures (bad seek/commit/control input) are per-operation
//! errors: they reject the single call and leave the session running.
//! Broker-reported failures are surfaced to the caller or on a session's
//! error output, never swallowed.

use crate::broker::BrokerError;
use std::fmt;
use thiserror::Error;

/// Result type alias for flowkafka-connect
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Main error type for the connector runtime
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Malformed broker or security configuration (fatal at construction)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connect/subscribe failure during session init (no auto-retry here;
    /// retry is the broker client's job via `RetryConfig`)
    #[error("Init error: {0}")]
    Init(String),

    /// Malformed seek instruction, rejected before reaching the broker
    #[error("Seek error: {0}")]
    InvalidSeek(String),

    /// Malformed commit instruction, rejected before reaching the broker
    #[error("Commit error: {0}")]
    InvalidCommit(String),

    /// Control message that could not be parsed at all
    #[error("Invalid control message: {0}")]
    InvalidControl(String),

    /// Broker rejected or failed a send; the session stays ready
    #[error("Send failed: {0}")]
    Send(String),

    /// Broker rejected or failed an offset commit; the session stays ready
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Error reported by the broker client capability
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Operation attempted on a session that was never initialized
    #[error("Session not initialized")]
    NotInitialized,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an init error
    pub fn init(msg: impl fmt::Display) -> Self {
        Self::Init(msg.to_string())
    }

    /// Create an invalid-seek error
    pub fn invalid_seek(msg: impl Into<String>) -> Self {
        Self::InvalidSeek(msg.into())
    }

    /// Create an invalid-commit error
    pub fn invalid_commit(msg: impl Into<String>) -> Self {
        Self::InvalidCommit(msg.into())
    }

    /// Create a send-failure error
    pub fn send(msg: impl fmt::Display) -> Self {
        Self::Send(msg.to_string())
    }

    /// Create a commit-failure error
    pub fn commit(msg: impl fmt::Display) -> Self {
        Self::Commit(msg.to_string())
    }

    /// Validation errors reject one operation and leave the session intact
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidSeek(_) | Self::InvalidCommit(_) | Self::InvalidControl(_)
        )
    }
}

/// Observable session state, exposed to the host for UI feedback.
///
/// Purely diagnostic; correctness never depends on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// No broker-side handle exists yet
    #[default]
    Uninitialized,
    /// Connecting/subscribing in progress
    Initializing,
    /// Connected and accepting work
    Ready,
    /// Partition consumption paused at the broker
    Paused,
    /// Unrecoverable failure during init or the run loop
    Error,
    /// Terminal: the broker-side handle has been disconnected
    Disconnected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Paused => write!(f, "paused"),
            Self::Error => write!(f, "error"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectError::invalid_seek("invalid offset");
        assert_eq!(err.to_string(), "Seek error: invalid offset");

        let err = ConnectError::config("TLS selected but no trust material");
        assert_eq!(
            err.to_string(),
            "Configuration error: TLS selected but no trust material"
        );
    }

    #[test]
    fn test_validation_check() {
        assert!(ConnectError::invalid_seek("x").is_validation());
        assert!(ConnectError::invalid_commit("x").is_validation());
        assert!(!ConnectError::config("x").is_validation());
        assert!(!ConnectError::send("x").is_validation());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Ready.to_string(), "ready");
        assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(SessionStatus::default(), SessionStatus::Uninitialized);
    }
}
