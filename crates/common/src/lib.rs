//! Primitives shared by the token issuer and its test utilities.

#![warn(clippy::pedantic)]

/// Secret types that redact themselves in `Debug` output
pub mod secret;

/// JWT size limits, clock skew and header helpers
pub mod jwt;

/// Managed identity access tokens for outbound Azure calls
pub mod token_credential;
