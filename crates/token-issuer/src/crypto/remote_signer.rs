//! RSA signing with a key that never leaves Key Vault.
//!
//! [`RemoteSignatureProvider`] plugs a vault-held key into [`sign_jwt`]:
//! `sign` hashes locally and makes one remote sign call, `verify` runs
//! entirely in-process against the public modulus and exponent.
//!
//! [`sign_jwt`]: super::sign_jwt

use super::{JwtSigner, SigningAlgorithm, SigningError};
use crate::models::KeyVaultKey;
use crate::observability::metrics::record_remote_sign;
use crate::repositories::KeyDirectory;
use async_trait::async_trait;
use common::jwt::trim_leading_zeros;
use ring::digest::{digest, SHA256};
use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_2048_8192_SHA256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Public half of an enabled RSA key version in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRsaKey {
    name: String,
    version: String,
    n: Vec<u8>,
    e: Vec<u8>,
}

impl RemoteRsaKey {
    /// Validate a fetched key and keep only what signing and verification need.
    ///
    /// The key must be enabled, RSA or RSA-HSM, carry a version and have
    /// non-empty `n` and `e`.
    pub fn from_key(key: &KeyVaultKey) -> Result<Self, SigningError> {
        if key.enabled != Some(true) {
            return Err(SigningError::InvalidKey(format!(
                "key '{}' is not enabled",
                key.name
            )));
        }
        if !key.key_type.is_rsa() {
            return Err(SigningError::InvalidKey(format!(
                "key '{}' has type {}, expected RSA",
                key.name, key.key_type
            )));
        }
        let version = key
            .version
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SigningError::InvalidKey(format!("key '{}' has no version", key.name)))?;

        let n = trim_leading_zeros(&key.n).to_vec();
        let e = trim_leading_zeros(&key.e).to_vec();
        if n.is_empty() || e.is_empty() {
            return Err(SigningError::InvalidKey(format!(
                "key '{}' is missing its modulus or exponent",
                key.name
            )));
        }

        Ok(Self {
            name: key.name.clone(),
            version,
            n,
            e,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn modulus(&self) -> &[u8] {
        &self.n
    }

    pub fn exponent(&self) -> &[u8] {
        &self.e
    }

    /// Key size in bits, from the modulus.
    pub fn key_size(&self) -> usize {
        match self.n.first() {
            Some(first) => {
                let leading = usize::try_from(first.leading_zeros()).unwrap_or(0);
                self.n.len().saturating_mul(8).saturating_sub(leading)
            }
            None => 0,
        }
    }
}

fn checked_range<'a>(
    buffer: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], SigningError> {
    if len < 1 {
        return Err(SigningError::InvalidArgument(format!(
            "{what} length must be at least 1"
        )));
    }
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| {
            SigningError::InvalidArgument(format!(
                "{what} offset {offset} + length {len} exceeds buffer length {}",
                buffer.len()
            ))
        })?;
    buffer
        .get(offset..end)
        .ok_or_else(|| SigningError::InvalidArgument(format!("{what} range out of bounds")))
}

/// Signs through Key Vault and verifies locally.
pub struct RemoteSignatureProvider {
    key: RemoteRsaKey,
    algorithm: SigningAlgorithm,
    directory: Arc<dyn KeyDirectory>,
}

impl RemoteSignatureProvider {
    pub fn new(
        key: RemoteRsaKey,
        algorithm: SigningAlgorithm,
        directory: Arc<dyn KeyDirectory>,
    ) -> Self {
        Self {
            key,
            algorithm,
            directory,
        }
    }

    pub fn key(&self) -> &RemoteRsaKey {
        &self.key
    }

    /// SHA-256 the message and have the vault sign the digest.
    ///
    /// Exactly one remote call; failures are returned, never retried.
    #[instrument(skip_all, name = "remote_signer.sign", fields(kid = %self.key.version))]
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        if message.is_empty() {
            return Err(SigningError::InvalidArgument(
                "message must not be empty".to_string(),
            ));
        }

        let message_digest = digest(&SHA256, message);
        let start = Instant::now();

        let result = self
            .directory
            .sign(
                &self.key.name,
                &self.key.version,
                self.algorithm,
                message_digest.as_ref(),
            )
            .await;

        match result {
            Ok(signature) => {
                record_remote_sign("success", start.elapsed());
                debug!(target: "issuer.crypto.remote_signer", "Remote signature produced");
                Ok(signature)
            }
            Err(e) => {
                record_remote_sign("error", start.elapsed());
                warn!(target: "issuer.crypto.remote_signer", error = %e, "Remote signing failed");
                Err(SigningError::Remote(e.to_string()))
            }
        }
    }

    /// Verify an RS256 signature with the public key only.
    ///
    /// Returns `Ok(false)` for a signature that does not verify.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        if message.is_empty() {
            return Err(SigningError::InvalidArgument(
                "message must not be empty".to_string(),
            ));
        }
        if signature.is_empty() {
            return Err(SigningError::InvalidArgument(
                "signature must not be empty".to_string(),
            ));
        }

        let public_key = RsaPublicKeyComponents {
            n: self.key.n.as_slice(),
            e: self.key.e.as_slice(),
        };
        Ok(public_key
            .verify(&RSA_PKCS1_2048_8192_SHA256, message, signature)
            .is_ok())
    }

    /// [`verify`](Self::verify) over sub-ranges of the given buffers.
    ///
    /// A zero length or a range past the end of its buffer is an
    /// `InvalidArgument` error rather than a failed verification.
    pub fn verify_range(
        &self,
        message: &[u8],
        message_offset: usize,
        message_len: usize,
        signature: &[u8],
        signature_offset: usize,
        signature_len: usize,
    ) -> Result<bool, SigningError> {
        let message = checked_range(message, message_offset, message_len, "message")?;
        let signature = checked_range(signature, signature_offset, signature_len, "signature")?;
        self.verify(message, signature)
    }
}

#[async_trait]
impl JwtSigner for RemoteSignatureProvider {
    fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn key_id(&self) -> &str {
        &self.key.version
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        RemoteSignatureProvider::sign(self, message).await
    }
}
