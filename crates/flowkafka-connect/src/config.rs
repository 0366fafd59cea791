//! Configuration types for flowkafka-connect
//!
//! Architecture:
//!   host configuration → `BrokerConfig` → shared `BrokerHandle`
//!   `SubscriptionSpec` / `ProducerSpec` → one session each, derived
//!   from that handle
//!
//! All of these are constructed once from declarative host configuration
//! and immutable afterwards. Connection retry, timeouts and security are
//! delegated to the broker client capability; this layer only validates
//! that the declared security mode is complete.

use crate::codec::PayloadKind;
use crate::error::{ConnectError, Result};
use crate::types::SensitiveString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration for a connector deployment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,

    /// Broker connection configuration, shared by all sessions
    pub broker: BrokerConfig,

    /// Named consumer sessions
    #[serde(default)]
    pub consumers: HashMap<String, SubscriptionSpec>,

    /// Named producer sessions
    #[serde(default)]
    pub producers: HashMap<String, ProducerSpec>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ConnectConfig {
    /// Load configuration from a YAML file, expanding `${VAR}` and
    /// `${VAR:-default}` references before parsing
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let expanded = Self::expand_env_vars(&content);

        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;

        for (name, spec) in &self.consumers {
            if spec.topic.is_empty() {
                return Err(ConnectError::config(format!(
                    "Consumer '{}' must have a 'topic'",
                    name
                )));
            }
            if spec.group_id.is_empty() {
                return Err(ConnectError::config(format!(
                    "Consumer '{}' must have a 'group_id'",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Log level forwarded to the broker client and used for tracing init
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    None,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

/// Broker connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Bootstrap addresses (host:port), tried in order
    pub bootstrap_servers: Vec<String>,

    /// Client identifier presented to the broker
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retry policy handed to the broker client; sessions never retry on
    /// their own
    #[serde(default)]
    pub retry: Option<RetryConfig>,

    /// Security mode; exactly one of none/TLS/SASL is active
    #[serde(default)]
    pub security: SecurityConfig,
}

fn default_client_id() -> String {
    "flowkafka".to_string()
}

impl Default for BrokerConfig {
    /// A plaintext local broker, matching the host editor's defaults
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            client_id: default_client_id(),
            log_level: LogLevel::default(),
            connection_timeout_ms: default_connection_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: None,
            security: SecurityConfig::None,
        }
    }
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl BrokerConfig {
    /// Validate addresses and security-mode completeness.
    ///
    /// Resolving the actual trust material (reading PEM files, etc.) is
    /// the security-material loader's job; this only rejects modes that
    /// cannot possibly be completed.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_servers.is_empty() {
            return Err(ConnectError::config(
                "at least one bootstrap server is required",
            ));
        }
        self.security.validate()
    }
}

/// Retry policy for the broker client (connect and request retries)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum total retry time in milliseconds
    #[serde(default = "default_max_retry_time_ms")]
    pub max_retry_time_ms: u64,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_retry_time_ms")]
    pub initial_retry_time_ms: u64,

    /// Randomization factor for the backoff
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Backoff multiplier between attempts
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_time_ms: default_max_retry_time_ms(),
            initial_retry_time_ms: default_initial_retry_time_ms(),
            factor: default_factor(),
            multiplier: default_multiplier(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_max_retry_time_ms() -> u64 {
    30_000
}
fn default_initial_retry_time_ms() -> u64 {
    300
}
fn default_factor() -> f64 {
    0.2
}
fn default_multiplier() -> u32 {
    2
}
fn default_max_retries() -> u32 {
    5
}

/// Security mode for the broker connection.
///
/// Exactly one mode is active; the tagged representation makes an
/// ambiguous TLS+SASL combination unrepresentable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SecurityConfig {
    /// Plaintext connection
    #[default]
    None,
    /// TLS, optionally mutual
    Tls {
        /// Path to the CA certificate for server verification
        #[serde(default)]
        ca: Option<String>,
        /// Path to the client certificate (for mTLS)
        #[serde(default)]
        cert: Option<String>,
        /// Path to the client private key (for mTLS)
        #[serde(default)]
        key: Option<String>,
        /// Passphrase for the private key
        #[serde(default)]
        passphrase: Option<SensitiveString>,
    },
    /// SASL authentication
    Sasl {
        /// SASL mechanism (e.g. "plain", "scram-sha-256")
        #[serde(default = "default_sasl_mechanism")]
        mechanism: String,
        username: String,
        password: SensitiveString,
        /// Wrap the SASL exchange in TLS
        #[serde(default)]
        ssl: bool,
        /// Accept self-signed broker certificates when `ssl` is on
        #[serde(default)]
        allow_self_signed: bool,
    },
}

fn default_sasl_mechanism() -> String {
    "plain".to_string()
}

impl SecurityConfig {
    /// Reject security modes that are declared but incomplete
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Tls { ca, cert, key, .. } => {
                if ca.is_none() && cert.is_none() {
                    return Err(ConnectError::config(
                        "TLS selected but no trust material configured (need 'ca' or a client cert)",
                    ));
                }
                if cert.is_some() != key.is_some() {
                    return Err(ConnectError::config(
                        "TLS client auth requires both 'cert' and 'key'",
                    ));
                }
                Ok(())
            }
            Self::Sasl {
                mechanism,
                username,
                ..
            } => {
                if mechanism.is_empty() {
                    return Err(ConnectError::config("SASL mechanism must not be empty"));
                }
                if username.is_empty() {
                    return Err(ConnectError::config("SASL username must not be empty"));
                }
                Ok(())
            }
        }
    }
}

/// One subscription's immutable configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionSpec {
    /// Topic to subscribe to
    pub topic: String,

    /// Consumer group ID
    pub group_id: String,

    /// Start from the earliest retained offset instead of the latest
    #[serde(default)]
    pub from_beginning: bool,

    /// How to decode record keys
    #[serde(default)]
    pub key_kind: PayloadKind,

    /// How to decode record values
    #[serde(default)]
    pub value_kind: PayloadKind,

    /// Advanced consumer tuning; `None` leaves everything to the broker
    /// client's defaults
    #[serde(default)]
    pub tuning: Option<ConsumerTuning>,
}

/// Advanced consumer tuning knobs, passed through to the broker client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerTuning {
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    #[serde(default = "default_rebalance_timeout_ms")]
    pub rebalance_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_metadata_max_age_ms")]
    pub metadata_max_age_ms: u64,

    #[serde(default = "default_max_bytes_per_partition")]
    pub max_bytes_per_partition: u64,

    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Let the broker client auto-commit; manual commits still pass
    /// through the session's monotonicity guard
    #[serde(default)]
    pub auto_commit: bool,

    #[serde(default = "default_auto_commit_interval_ms")]
    pub auto_commit_interval_ms: u64,
}

fn default_session_timeout_ms() -> u64 {
    30_000
}
fn default_rebalance_timeout_ms() -> u64 {
    60_000
}
fn default_heartbeat_interval_ms() -> u64 {
    3_000
}
fn default_metadata_max_age_ms() -> u64 {
    300_000
}
fn default_max_bytes_per_partition() -> u64 {
    1_048_576
}
fn default_min_bytes() -> u64 {
    1
}
fn default_max_bytes() -> u64 {
    10_485_760
}
fn default_max_wait_ms() -> u64 {
    5_000
}
fn default_auto_commit_interval_ms() -> u64 {
    5_000
}

/// Acknowledgment level for produced messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckLevel {
    /// All in-sync replicas must confirm
    #[default]
    All,
    /// Fire and forget
    None,
    /// Partition leader only
    Leader,
}

impl AckLevel {
    /// Wire value understood by Kafka-compatible brokers
    pub fn as_i16(self) -> i16 {
        match self {
            Self::All => -1,
            Self::None => 0,
            Self::Leader => 1,
        }
    }
}

/// One publisher's immutable configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProducerSpec {
    /// Acknowledgment level
    #[serde(default)]
    pub acks: AckLevel,

    /// Broker response timeout in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// How to encode message keys
    #[serde(default)]
    pub key_kind: PayloadKind,

    /// How to encode message values
    #[serde(default)]
    pub value_kind: PayloadKind,

    /// Session-level defaults merged into every send; a set default wins
    /// over the per-call value
    #[serde(default)]
    pub defaults: SendDefaults,
}

fn default_response_timeout_ms() -> u64 {
    30_000
}

/// Session-level send defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendDefaults {
    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub partition: Option<i32>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}
