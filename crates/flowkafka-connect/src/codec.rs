//! Message codec: raw bytes ⇄ typed payloads
//!
//! Decoding is deliberately tolerant: a payload that fails to parse is
//! delivered unchanged as raw bytes with a warning, never dropped. The
//! same function is idempotent on already-decoded values, so it is safe
//! to run a payload through it twice.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// How a key or value is interpreted on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Identity passthrough
    #[default]
    Raw,
    /// UTF-8 text
    String,
    /// JSON document
    Json,
}

/// A key or value on either side of the codec
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Bytes(Bytes::new())
    }
}

impl Payload {
    /// Empty payloads are dropped by the producer guard before any broker
    /// call is made
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(b) => b.is_empty(),
            Self::Text(t) => t.is_empty(),
            Self::Json(v) => v.is_null(),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

/// Non-fatal decode failure; the message is still delivered, degraded to
/// its raw bytes
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(String),
    #[error("payload is not valid JSON: {0}")]
    Json(String),
}

/// Strict decode of raw bytes into the requested kind
pub fn try_decode(bytes: &Bytes, kind: PayloadKind) -> Result<Payload, CodecError> {
    match kind {
        PayloadKind::Raw => Ok(Payload::Bytes(bytes.clone())),
        PayloadKind::String => std::str::from_utf8(bytes)
            .map(|s| Payload::Text(s.to_string()))
            .map_err(|e| CodecError::Utf8(e.to_string())),
        PayloadKind::Json => serde_json::from_slice(bytes)
            .map(Payload::Json)
            .map_err(|e| CodecError::Json(e.to_string())),
    }
}

/// Decode a payload, degrading to the original bytes on failure.
///
/// Already-decoded values pass through unchanged regardless of `kind`.
pub fn decode(payload: Payload, kind: PayloadKind) -> Payload {
    let bytes = match payload {
        Payload::Bytes(b) => b,
        decoded => return decoded,
    };

    match try_decode(&bytes, kind) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Message decode failed, delivering raw bytes: {}", e);
            Payload::Bytes(bytes)
        }
    }
}

/// Encode a payload for the wire.
///
/// Byte payloads pass through untouched; `kind` only matters for values
/// that still need serializing.
pub fn encode(payload: Payload, kind: PayloadKind) -> Bytes {
    match payload {
        Payload::Bytes(b) => b,
        Payload::Text(t) => match kind {
            PayloadKind::Json => Bytes::from(
                serde_json::to_vec(&serde_json::Value::String(t))
                    .expect("serializing a string cannot fail"),
            ),
            _ => Bytes::from(t.into_bytes()),
        },
        Payload::Json(v) => {
            Bytes::from(serde_json::to_vec(&v).expect("serializing a serde_json::Value cannot fail"))
        }
    }
}

/// Decode record headers per-entry as UTF-8.
///
/// An absent set and a present-but-empty set both yield `None`, so
/// downstream components never receive a misleading empty map.
pub fn decode_headers(headers: Option<&HashMap<String, Bytes>>) -> Option<HashMap<String, String>> {
    let headers = headers?;
    if headers.is_empty() {
        return None;
    }
    Some(
        headers
            .iter()
            .map(|(k, v)| (k.clone(), String::from_utf8_lossy(v).into_owned()))
            .collect(),
    )
}

/// Encode host-provided headers to wire bytes
pub fn encode_headers(headers: &HashMap<String, String>) -> HashMap<String, Bytes> {
    headers
        .iter()
        .map(|(k, v)| (k.clone(), Bytes::from(v.clone().into_bytes())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_is_identity() {
        let bytes = Bytes::from_static(b"\x00\x01\xff");
        assert_eq!(
            decode(Payload::Bytes(bytes.clone()), PayloadKind::Raw),
            Payload::Bytes(bytes)
        );
    }

    #[test]
    fn test_string_round_trip() {
        let bytes = Bytes::from_static("héllo wörld".as_bytes());
        let decoded = decode(Payload::Bytes(bytes.clone()), PayloadKind::String);
        assert_eq!(decoded, Payload::Text("héllo wörld".to_string()));
        assert_eq!(encode(decoded, PayloadKind::String), bytes);
    }

    #[test]
    fn test_json_decode() {
        let bytes = Bytes::from_static(br#"{"id":1,"name":"a"}"#);
        let decoded = decode(Payload::Bytes(bytes), PayloadKind::Json);
        assert_eq!(decoded, Payload::Json(json!({"id": 1, "name": "a"})));
    }

    #[test]
    fn test_malformed_json_degrades_to_bytes() {
        let bytes = Bytes::from_static(b"{not json");
        let decoded = decode(Payload::Bytes(bytes.clone()), PayloadKind::Json);
        assert_eq!(decoded, Payload::Bytes(bytes.clone()));

        // the strict variant reports the warning cause
        assert!(matches!(
            try_decode(&bytes, PayloadKind::Json),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_degrades_to_bytes() {
        let bytes = Bytes::from_static(b"\xff\xfe");
        let decoded = decode(Payload::Bytes(bytes.clone()), PayloadKind::String);
        assert_eq!(decoded, Payload::Bytes(bytes));
    }

    #[test]
    fn test_decode_idempotent_on_decoded_values() {
        let text = Payload::Text("already decoded".into());
        assert_eq!(decode(text.clone(), PayloadKind::Json), text);

        let value = Payload::Json(json!([1, 2, 3]));
        assert_eq!(decode(value.clone(), PayloadKind::String), value);
    }

    #[test]
    fn test_encode_bytes_passthrough() {
        let bytes = Bytes::from_static(b"raw");
        assert_eq!(
            encode(Payload::Bytes(bytes.clone()), PayloadKind::Json),
            bytes
        );
    }

    #[test]
    fn test_encode_json() {
        let encoded = encode(Payload::Json(json!({"a": 1})), PayloadKind::Json);
        assert_eq!(&encoded[..], br#"{"a":1}"#);

        // a text payload under the json kind is serialized as a JSON string
        let encoded = encode(Payload::Text("x".into()), PayloadKind::Json);
        assert_eq!(&encoded[..], br#""x""#);
    }

    #[test]
    fn test_headers_absent_and_empty_are_equivalent() {
        assert_eq!(decode_headers(None), None);
        assert_eq!(decode_headers(Some(&HashMap::new())), None);
    }

    #[test]
    fn test_headers_decoded_per_entry() {
        let mut headers = HashMap::new();
        headers.insert("trace-id".to_string(), Bytes::from_static(b"abc123"));
        let decoded = decode_headers(Some(&headers)).unwrap();
        assert_eq!(decoded["trace-id"], "abc123");
    }

    #[test]
    fn test_empty_payload_detection() {
        assert!(Payload::Bytes(Bytes::new()).is_empty());
        assert!(Payload::Text(String::new()).is_empty());
        assert!(Payload::Json(serde_json::Value::Null).is_empty());
        assert!(!Payload::Json(json!(0)).is_empty());
        assert!(!Payload::Text("x".into()).is_empty());
    }
}
