//! Request/response REST facade.
//!
//! Out of scope for the streaming core (see SPEC_FULL.md) — an ordinary
//! retrying HTTP client. Retries on {429, 500, 502, 503, 504} with
//! exponential backoff (500 ms × 2^(attempt−1)), and coerces known
//! string-encoded float fields on ingested responses before deserializing.
//! Date fields need no such step: `chrono`'s `Deserialize` impl accepts an
//! RFC3339 string directly, so a field typed `DateTime<Utc>` in `T` coerces
//! itself during `serde_json::from_value`.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::FinlightError;

const RETRYABLE_STATUSES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

const MAX_ATTEMPTS: u32 = 5;

/// Request/response client for the Finlight REST API.
pub struct FinlightClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinlightClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url().to_owned(),
            api_key: config.api_key().to_owned(),
        }
    }

    /// GET `path` with `query`, coercing the named string-encoded float
    /// fields and deserializing the result as `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        float_fields: &[&str],
    ) -> Result<T, FinlightError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let resp = self
                .http
                .request(Method::GET, &url)
                .header("x-api-key", &self.api_key)
                .query(query)
                .send()
                .await?;

            let status = resp.status();
            if RETRYABLE_STATUSES.contains(&status) && attempt < MAX_ATTEMPTS {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                warn!(%status, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                tokio::time::sleep(delay).await;
                continue;
            }

            let body: Value = resp.error_for_status()?.json().await?;
            let coerced = coerce_response(body, float_fields);
            debug!(path, attempt, "request succeeded");
            return Ok(serde_json::from_value(coerced)?);
        }
    }
}

/// Recursively coerce string-encoded floats on named fields, leaving every
/// other field untouched.
fn coerce_response(value: Value, float_fields: &[&str]) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| coerce_response(v, float_fields))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                let coerced = if float_fields.contains(&key.as_str()) {
                    coerce_leaf(v)
                } else {
                    coerce_response(v, float_fields)
                };
                out.insert(key, coerced);
            }
            Value::Object(out)
        }
        other => other,
    }
}

fn coerce_leaf(value: Value) -> Value {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(s)),
        other => other,
    }
}
