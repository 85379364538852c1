//! Webhook signature verification.
//!
//! The provider signs each delivery with the shared webhook secret and sends
//! `stripe-signature: t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`.
//! The signed message is `"{t}.{raw body}"` and the MAC is HMAC-SHA256.
//! More than one `v1` entry appears while a secret is being rolled; any of
//! them may match.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Why a webhook delivery was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing stripe-signature header")]
    MissingHeader,

    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("no signature matched the payload")]
    Mismatch,

    #[error("webhook secret unusable")]
    InvalidSecret,
}

/// Verifies webhook deliveries against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Verify `payload` against the signature header at time `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` if the header is absent or malformed, the
    /// timestamp is further than the tolerance from `now`, or no `v1`
    /// signature matches.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let parsed = parse_header(header)?;

        if now.abs_diff(parsed.timestamp) > self.tolerance.as_secs() {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let mac = self.mac(parsed.timestamp, payload)?;
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
        });

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Verify against the current system time.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    pub fn verify_now(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        self.verify(payload, header, chrono::Utc::now().timestamp())
    }

    /// Build a valid signature header for `payload` at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidSecret` if the secret cannot key the MAC.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let signature = hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

/// Split `t=...,v1=...,v0=...` into the timestamp and the `v1` signatures.
/// Other schemes are ignored.
fn parse_header(header: &str) -> Result<ParsedHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    SignatureError::MalformedHeader("timestamp is not an integer".to_string())
                })?);
            }
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader(
            "no v1 signature".to_string(),
        ));
    }

    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}
