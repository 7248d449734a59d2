use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Key Vault key type (`kty`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// Software-protected RSA key.
    Rsa,
    /// HSM-protected RSA key.
    RsaHsm,
    /// Any other type (EC, EC-HSM, oct, ...). Never published or used for signing.
    Other(String),
}

impl KeyType {
    /// Both RSA variants expose `n` and `e` and sign with RS256.
    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyType::Rsa | KeyType::RsaHsm)
    }
}

impl From<&str> for KeyType {
    fn from(kty: &str) -> Self {
        match kty {
            "RSA" => KeyType::Rsa,
            "RSA-HSM" => KeyType::RsaHsm,
            other => KeyType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Rsa => f.write_str("RSA"),
            KeyType::RsaHsm => f.write_str("RSA-HSM"),
            KeyType::Other(kty) => f.write_str(kty),
        }
    }
}

/// One entry of a key's version listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProperties {
    pub name: String,
    /// `None` if the listed key identifier carried no version segment.
    pub version: Option<String>,
    /// `None` when the directory omitted the attribute.
    pub enabled: Option<bool>,
}

impl KeyProperties {
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// Public view of one key version. Holds no private material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultKey {
    pub name: String,
    pub version: Option<String>,
    pub key_type: KeyType,
    /// RSA modulus, big-endian.
    pub n: Vec<u8>,
    /// RSA public exponent, big-endian.
    pub e: Vec<u8>,
    pub enabled: Option<bool>,
}

/// JWKS response (RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<JsonWebKey>,
}

/// RSA signing key in JWK form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonWebKey {
    pub kty: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

/// OIDC discovery document, reduced to the fields relying parties need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OidcMetadata {
    pub issuer: String,
    pub jwks_uri: String,
}

/// Query string of `GET /token`.
///
/// Kept as a raw string so a malformed id yields the issuer's own 400 body
/// instead of the extractor's rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenQuery {
    pub group_object_id: Option<String>,
}

/// Successful `GET /token` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub requestor_object_id: Uuid,
    pub requested_group_object_id: Uuid,
}

/// Claims of an issued group token.
///
/// `requestor_oid` identifies a person and is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedClaims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub requestor_oid: String,
}

impl fmt::Debug for IssuedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedClaims")
            .field("sub", &self.sub)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("requestor_oid", &"[REDACTED]")
            .finish()
    }
}
