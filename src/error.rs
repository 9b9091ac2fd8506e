//! Crate-wide error type.

/// Errors surfaced by the REST facade, webhook verifier, and streaming client.
#[derive(Debug, thiserror::Error)]
pub enum FinlightError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("HMAC: {0}")]
    Hmac(String),

    #[error("webhook timestamp skew {0}s exceeds tolerance")]
    TimestampSkew(i64),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("connect rejected: {0}")]
    ConnectRejected(String),
}
