//! Observability for the token issuer.
//!
//! # Privacy by Default
//!
//! Instrumentation uses `#[instrument(skip_all)]` and explicit field allow-listing.
//! Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (status, key version, route)
//! - **HASHED**: SHA-256 hashed for correlation (caller and group object ids)
//! - **NEVER**: Must never appear in logs (bearer tokens, issued tokens, managed identity secrets)

pub mod metrics;

use crate::errors::IssuerError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Not a secret-protection primitive: object ids are enumerable. It keeps raw
/// ids out of log storage while still letting entries for one caller be joined.
pub fn hash_for_correlation(value: &str) -> String {
    let result = Sha256::digest(value.as_bytes());
    result
        .get(..4)
        .map(hex::encode)
        .unwrap_or_default()
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed request input
    Validation,
    /// Missing or invalid bearer token
    Authentication,
    /// Caller is not in the requested group
    Authorization,
    /// Key Vault, Graph, managed identity or local failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&IssuerError> for ErrorCategory {
    fn from(err: &IssuerError) -> Self {
        match err.root() {
            IssuerError::BadRequest(_) => ErrorCategory::Validation,
            IssuerError::InvalidToken(_) => ErrorCategory::Authentication,
            IssuerError::Forbidden(_) => ErrorCategory::Authorization,
            IssuerError::Dependency(_)
            | IssuerError::Internal(_)
            | IssuerError::Context { .. } => ErrorCategory::Internal,
        }
    }
}
