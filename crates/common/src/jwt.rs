//! JWT helpers shared by the issuer and its inbound validator.
//!
//! - Size limit applied before any parsing
//! - Clock skew constants for `iat` checks
//! - `kid` extraction from the compact header
//! - Base64url handling of RSA public components (`n`, `e`)
//!
//! Only RS256 tokens are produced or accepted by the issuer. Error messages
//! are generic; details go to debug logs under the `common.jwt` target.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

/// Maximum accepted JWT size in bytes (8KB).
///
/// Checked before base64 decoding or signature verification so oversized
/// bearer tokens are rejected with minimal work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default tolerance for `iat`, `nbf` and `exp` clock drift (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound on configurable clock skew (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Errors raised while inspecting a JWT before or after verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    #[error("The access token is invalid or expired")]
    MalformedToken,

    #[error("The access token is invalid or expired")]
    MissingKid,

    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

/// Extract the `kid` header value without verifying the signature.
///
/// The value is only good for looking up a key in a trusted key set; the
/// token must still be verified with that key.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` if it is not three dot-separated parts with a JSON header
/// - `MissingKid` if the header has no non-empty string `kid`
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let header_part = parts.next().ok_or(JwtValidationError::MalformedToken)?;
    if parts.count() != 2 {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}

/// Reject tokens whose `iat` lies more than `clock_skew` in the future.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` when `iat > now + clock_skew`.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Strip leading zero octets from a big-endian unsigned integer.
///
/// JWK `n` and `e` must use the minimal octet encoding (RFC 7518 §6.3.1).
#[must_use]
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes.get(start..).unwrap_or_default()
}

/// Encode an RSA public component as JWK base64url (minimal octets, no padding).
#[must_use]
pub fn encode_rsa_component(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(trim_leading_zeros(bytes))
}

/// Decode a JWK base64url RSA component. Trailing `=` padding is tolerated.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the value is not valid base64url.
pub fn decode_rsa_component(b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(b64url.trim_end_matches('='))
}
