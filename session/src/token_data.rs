//! Bearer token payload decoding and expiry predicates.
//!
//! Every predicate is fail-closed: a token whose payload cannot be decoded, or
//! that carries no `exp` claim, is reported as expired and due for refresh.
//! Signatures are not verified; the server remains the authority.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::config::REFRESH_LEAD_TIME;

/// Decoded claims of a bearer token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenPayload {
    /// Expiry in seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl TokenPayload {
    /// `exp` in milliseconds, treating a zero claim as absent.
    fn exp_millis(&self) -> Option<i64> {
        self.exp
            .filter(|exp| *exp != 0)
            .map(|exp| exp.saturating_mul(1000))
    }
}

#[derive(Debug, Error)]
enum DecodeError {
    #[error("token has no payload segment")]
    MissingSegment,
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn try_decode(token: &str) -> Result<TokenPayload, DecodeError> {
    let mut segments = token.split('.');
    let _header = segments.next();
    let payload_b64 = segments.next().ok_or(DecodeError::MissingSegment)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&payload_bytes)?)
}

/// Decodes the payload segment of `token`. Returns `None` on any failure.
pub fn decode(token: &str) -> Option<TokenPayload> {
    match try_decode(token) {
        Ok(payload) => Some(payload),
        Err(err) => {
            trace!("failed to decode bearer token: {err}");
            None
        }
    }
}

pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    decode(token)
        .and_then(|payload| payload.exp_millis())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Milliseconds until expiry, or `None` when the token is undecidable.
fn millis_until_expiry(token: &str, now: DateTime<Utc>) -> Option<i64> {
    let exp_ms = decode(token)?.exp_millis()?;
    Some(exp_ms.saturating_sub(now.timestamp_millis()))
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match millis_until_expiry(token, now) {
        Some(remaining) => remaining <= 0,
        None => true,
    }
}

pub fn should_refresh(token: &str) -> bool {
    should_refresh_at(token, Utc::now())
}

pub fn should_refresh_at(token: &str, now: DateTime<Utc>) -> bool {
    should_refresh_within(token, now, REFRESH_LEAD_TIME)
}

/// Like [`should_refresh_at`] with an explicit lead time.
pub fn should_refresh_within(token: &str, now: DateTime<Utc>, lead: std::time::Duration) -> bool {
    let lead_ms = i64::try_from(lead.as_millis()).unwrap_or(i64::MAX);
    match millis_until_expiry(token, now) {
        Some(remaining) => remaining < lead_ms,
        None => true,
    }
}
