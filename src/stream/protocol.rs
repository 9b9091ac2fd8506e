//! Wire frame types for the streaming protocol.
//!
//! Frames are JSON objects discriminated by a top-level `action` string.
//! Variant field casing is dictated by the wire contract, not by a single
//! `rename_all` (`sendArticle` is camelCase, `admin_kick` is snake_case) —
//! each field is renamed individually instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct PongFrame {
    pub t: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdmitFrame {
    #[serde(rename = "leaseId")]
    pub lease_id: String,
    #[serde(rename = "serverNow")]
    pub server_now: Option<i64>,
    #[serde(rename = "clientNonce")]
    pub client_nonce: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreemptedFrame {
    pub reason: Option<String>,
    #[serde(rename = "newLeaseId")]
    pub new_lease_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendArticleFrame {
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminKickFrame {
    #[serde(rename = "retryAfter")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorFrame {
    pub data: Option<String>,
    pub error: Option<String>,
}

impl ErrorFrame {
    /// The message text, preferring `data` over `error` per §4.3.
    pub fn message(&self) -> &str {
        self.data.as_deref().or(self.error.as_deref()).unwrap_or("")
    }
}

/// A parsed inbound frame, or `Unknown` for an unrecognized `action`.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Pong(PongFrame),
    Admit(AdmitFrame),
    Preempted(PreemptedFrame),
    SendArticle(SendArticleFrame),
    AdminKick(AdminKickFrame),
    Error(ErrorFrame),
    Unknown(String),
}

/// Parse a raw text frame. Returns `None` (after logging) on malformed JSON —
/// the caller must not tear down the session for a single bad frame.
pub fn parse_inbound(text: &str) -> Option<InboundFrame> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "dropping malformed inbound frame");
            return None;
        }
    };

    let action = match value.get("action").and_then(Value::as_str) {
        Some(a) => a.to_owned(),
        None => {
            warn!("dropping inbound frame with no action field");
            return None;
        }
    };

    let frame = match action.as_str() {
        "pong" => serde_json::from_value(value).map(InboundFrame::Pong),
        "admit" => serde_json::from_value(value).map(InboundFrame::Admit),
        "preempted" => serde_json::from_value(value).map(InboundFrame::Preempted),
        "sendArticle" => serde_json::from_value(value).map(InboundFrame::SendArticle),
        "admin_kick" => serde_json::from_value(value).map(InboundFrame::AdminKick),
        "error" => serde_json::from_value(value).map(InboundFrame::Error),
        other => return Some(InboundFrame::Unknown(other.to_owned())),
    };

    match frame {
        Ok(f) => Some(f),
        Err(e) => {
            warn!(action = %action, error = %e, "dropping malformed inbound frame");
            None
        }
    }
}

/// `{ "action": "ping", "t": <unix-ms> }`
#[derive(Debug, Clone, Serialize)]
pub struct PingFrame {
    pub action: &'static str,
    pub t: i64,
}

impl PingFrame {
    pub fn now(now_ms: i64) -> Self {
        Self {
            action: "ping",
            t: now_ms,
        }
    }
}

/// The caller's subscription parameters, augmented with `clientNonce`.
pub fn build_subscription_frame(params: &Value, client_nonce: &str) -> Value {
    let mut obj = match params {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    obj.insert(
        "clientNonce".to_owned(),
        Value::String(client_nonce.to_owned()),
    );
    Value::Object(obj)
}
