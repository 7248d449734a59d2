//! Assertions for tokens issued by the service.

use crate::crypto_fixtures::RsaFixture;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

/// Claims of an issued group token.
#[derive(Debug, Deserialize)]
pub struct GroupTokenClaims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub requestor_oid: String,
}

/// Decode the claims segment without verifying the signature.
pub fn decode_claims_unverified(token: &str) -> GroupTokenClaims {
    let payload = token
        .split('.')
        .nth(1)
        .expect("JWT must have a payload segment");
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .expect("JWT payload must be base64url");
    serde_json::from_slice(&bytes).expect("JWT payload must be group token claims")
}

/// # Example
/// ```rust,ignore
/// body.access_token
///     .assert_valid_jwt()
///     .assert_signed_by(TEST_KEY_VERSION_1)
///     .assert_verifies_with(&VAULT_KEY_V1)
///     .assert_group_claims(TEST_GROUP_DEPLOYERS, TEST_CALLER_ALICE, TEST_HOSTNAME);
/// ```
pub trait IssuedTokenAssertions {
    /// Three segments, RS256, `typ: JWT`.
    fn assert_valid_jwt(&self) -> &Self;

    /// Header `kid` equals `kid`.
    fn assert_signed_by(&self, kid: &str) -> &Self;

    /// Signature verifies with `fixture`'s public key.
    fn assert_verifies_with(&self, fixture: &RsaFixture) -> &Self;

    /// `sub`, `requestor_oid`, `iss`, `aud` and the 600 second window.
    fn assert_group_claims(&self, group: Uuid, caller: Uuid, hostname: &str) -> &Self;
}

impl IssuedTokenAssertions for str {
    fn assert_valid_jwt(&self) -> &Self {
        assert_eq!(
            self.split('.').count(),
            3,
            "JWT must have 3 parts (header.payload.signature)"
        );
        let header = decode_header(self).expect("JWT header must decode");
        assert_eq!(header.alg, Algorithm::RS256, "Expected RS256 algorithm");
        assert_eq!(header.typ.as_deref(), Some("JWT"), "Expected JWT type");
        self
    }

    fn assert_signed_by(&self, kid: &str) -> &Self {
        let header = decode_header(self).expect("JWT header must decode");
        assert_eq!(header.kid.as_deref(), Some(kid), "Unexpected kid");
        self
    }

    fn assert_verifies_with(&self, fixture: &RsaFixture) -> &Self {
        let key = DecodingKey::from_rsa_components(&fixture.n_b64(), &fixture.e_b64())
            .expect("fixture components must load");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        decode::<serde_json::Value>(self, &key, &validation)
            .expect("token must verify with the fixture key");
        self
    }

    fn assert_group_claims(&self, group: Uuid, caller: Uuid, hostname: &str) -> &Self {
        let claims = decode_claims_unverified(self);
        assert_eq!(claims.sub, group.to_string(), "sub must be the group id");
        assert_eq!(claims.requestor_oid, caller.to_string());
        assert_eq!(claims.iss, format!("https://{hostname}"));
        assert_eq!(claims.aud, "api://AzureADTokenExchange");
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.nbf, 600, "token must be valid for 600 seconds");
        self
    }
}

impl IssuedTokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        self.as_str().assert_valid_jwt();
        self
    }

    fn assert_signed_by(&self, kid: &str) -> &Self {
        self.as_str().assert_signed_by(kid);
        self
    }

    fn assert_verifies_with(&self, fixture: &RsaFixture) -> &Self {
        self.as_str().assert_verifies_with(fixture);
        self
    }

    fn assert_group_claims(&self, group: Uuid, caller: Uuid, hostname: &str) -> &Self {
        self.as_str().assert_group_claims(group, caller, hostname);
        self
    }
}
