//! Builders for caller bearer tokens.

use crate::crypto_fixtures::{RsaFixture, UPSTREAM_KEY};
use crate::test_ids::{TEST_AUDIENCE, TEST_CALLER_ALICE, TEST_UPSTREAM_KID};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Value};
use uuid::Uuid;

/// Builder for tokens the upstream authority would issue to a caller.
///
/// # Example
/// ```rust,ignore
/// let token = CallerTokenBuilder::new(&server.upstream_issuer())
///     .for_caller(TEST_CALLER_ALICE)
///     .expires_in(3600)
///     .sign();
/// ```
pub struct CallerTokenBuilder {
    issuer: String,
    audience: String,
    oid: Option<String>,
    exp: i64,
    iat: i64,
    nbf: i64,
    kid: String,
}

impl CallerTokenBuilder {
    /// Token for `TEST_CALLER_ALICE` valid for an hour.
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        Self {
            issuer: issuer.to_string(),
            audience: TEST_AUDIENCE.to_string(),
            oid: Some(TEST_CALLER_ALICE.to_string()),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            kid: TEST_UPSTREAM_KID.to_string(),
        }
    }

    pub fn for_caller(mut self, oid: Uuid) -> Self {
        self.oid = Some(oid.to_string());
        self
    }

    /// Arbitrary `oid` claim value, e.g. a malformed one.
    pub fn with_raw_oid(mut self, oid: &str) -> Self {
        self.oid = Some(oid.to_string());
        self
    }

    pub fn without_oid(mut self) -> Self {
        self.oid = None;
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.audience = audience.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for an expired token).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    pub fn claims(&self) -> Value {
        let mut claims = json!({
            "iss": self.issuer,
            "aud": self.audience,
            "sub": "caller-subject",
            "tid": "00000000-0000-0000-0000-00000000000a",
            "exp": self.exp,
            "iat": self.iat,
            "nbf": self.nbf,
        });
        if let (Some(oid), Some(map)) = (&self.oid, claims.as_object_mut()) {
            map.insert("oid".to_string(), json!(oid));
        }
        claims
    }

    /// Sign with the upstream authority's key.
    pub fn sign(&self) -> String {
        self.sign_with(&UPSTREAM_KEY)
    }

    pub fn sign_with(&self, fixture: &RsaFixture) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, &self.claims(), &fixture.encoding_key()).expect("test token must encode")
    }
}
