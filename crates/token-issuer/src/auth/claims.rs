//! Claims of a validated caller token.
//!
//! `sub` and `oid` identify a person and are redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller claims, inserted into request extensions by `require_auth`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    #[serde(default)]
    pub sub: String,

    /// Directory object id of the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    /// Tenant id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    pub iss: String,
    pub exp: i64,
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl CallerClaims {
    /// The `oid` claim as a UUID, if present and well formed.
    pub fn object_id(&self) -> Option<Uuid> {
        self.oid.as_deref().and_then(|oid| oid.parse().ok())
    }
}

impl fmt::Debug for CallerClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerClaims")
            .field("sub", &"[REDACTED]")
            .field("oid", &self.oid.as_ref().map(|_| "[REDACTED]"))
            .field("tid", &self.tid)
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .finish()
    }
}
