//! JWT signing pipeline.
//!
//! Tokens are assembled here and the signature itself is produced by a
//! [`JwtSigner`]. In production the signer is
//! [`remote_signer::RemoteSignatureProvider`], which sends a SHA-256 digest to
//! Key Vault; the private key never leaves the vault.

pub mod remote_signer;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{Algorithm, Header};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Algorithms the issuer can sign with.
///
/// Closed set: anything outside it is rejected when the value is
/// constructed, so signing code never sees an unsupported algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
}

impl SigningAlgorithm {
    /// True only for algorithms this issuer can produce.
    pub fn supports(algorithm: Algorithm) -> bool {
        Self::try_from(algorithm).is_ok()
    }

    /// JWS `alg` name, also used as the Key Vault sign algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
        }
    }

    pub fn jwt_algorithm(&self) -> Algorithm {
        match self {
            SigningAlgorithm::Rs256 => Algorithm::RS256,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<Algorithm> for SigningAlgorithm {
    type Error = SigningError;

    fn try_from(algorithm: Algorithm) -> Result<Self, Self::Error> {
        match algorithm {
            Algorithm::RS256 => Ok(SigningAlgorithm::Rs256),
            other => Err(SigningError::UnsupportedAlgorithm(format!("{other:?}"))),
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(SigningAlgorithm::Rs256),
            other => Err(SigningError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unusable signing key: {0}")]
    InvalidKey(String),

    /// The key custody service failed to sign.
    #[error("Remote signing failed: {0}")]
    Remote(String),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Produces JWS signatures for [`sign_jwt`].
#[async_trait]
pub trait JwtSigner: Send + Sync {
    fn algorithm(&self) -> SigningAlgorithm;

    /// Value for the JWT `kid` header.
    fn key_id(&self) -> &str;

    /// Sign the JWS signing input (`base64url(header).base64url(claims)`).
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError>;
}

/// Build and sign a compact JWT with `typ: JWT` and the signer's `kid`.
pub async fn sign_jwt<C>(claims: &C, signer: &dyn JwtSigner) -> Result<String, SigningError>
where
    C: Serialize + Sync,
{
    let mut header = Header::new(signer.algorithm().jwt_algorithm());
    header.typ = Some("JWT".to_string());
    header.kid = Some(signer.key_id().to_string());

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| SigningError::Encoding(format!("header serialization failed: {e}")))?;
    let claims_json = serde_json::to_vec(claims)
        .map_err(|e| SigningError::Encoding(format!("claims serialization failed: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let signature = signer.sign(signing_input.as_bytes()).await?;
    if signature.is_empty() {
        return Err(SigningError::Remote("empty signature".to_string()));
    }

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}
