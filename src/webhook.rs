//! Signed-webhook verifier.
//!
//! A pure boundary contract: given a raw request body, a signature of shape
//! `sha256=<hex>` (the prefix is optional), a shared secret, and an optional
//! timestamp, compute HMAC-SHA256 over `timestamp + "." + body` (or the body
//! alone if no timestamp was supplied) and compare in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::FinlightError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";
const MAX_TIMESTAMP_SKEW_SECS: i64 = 5 * 60;

/// Verifies inbound webhook signatures against a shared secret.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify `signature` against `body`, optionally checking `timestamp` (unix
    /// seconds, as sent in the `x-finlight-timestamp` header) for skew.
    ///
    /// `now` is the caller's wall-clock reference, passed explicitly so the
    /// skew check is deterministic in tests.
    pub fn verify(
        &self,
        body: &str,
        signature: &str,
        timestamp: Option<i64>,
        now: i64,
    ) -> Result<(), FinlightError> {
        if let Some(ts) = timestamp {
            let skew = (now - ts).abs();
            if skew > MAX_TIMESTAMP_SKEW_SECS {
                return Err(FinlightError::TimestampSkew(skew));
            }
        }

        let signed_payload = match timestamp {
            Some(ts) => format!("{ts}.{body}"),
            None => body.to_owned(),
        };

        let expected = compute_hmac(&self.secret, &signed_payload)?;
        let given = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);

        if expected.len() != given.len() {
            return Err(FinlightError::InvalidSignature);
        }
        if expected.as_bytes().ct_eq(given.as_bytes()).unwrap_u8() != 1 {
            return Err(FinlightError::InvalidSignature);
        }
        Ok(())
    }
}

fn compute_hmac(secret: &str, payload: &str) -> Result<String, FinlightError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| FinlightError::Hmac(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
