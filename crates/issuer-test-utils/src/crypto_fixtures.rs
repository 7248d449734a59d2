//! Deterministic RSA fixtures for testing
//!
//! Three fixed RSA-2048 keys (PKCS#1 PEM under `fixtures/`):
//! - `VAULT_KEY_V1`, `VAULT_KEY_V2`: versions of the vault signing key
//! - `UPSTREAM_KEY`: the upstream authority that signs caller tokens
//!
//! The vault sign operation receives a SHA-256 digest, not the message, so
//! mocks need [`RsaFixture::sign_digest`]; `ring` only signs whole messages.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::sha2::{Digest, Sha256};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use token_issuer::models::{KeyType, KeyVaultKey};

/// A fixed RSA key pair.
pub struct RsaFixture {
    pem: &'static str,
}

pub static VAULT_KEY_V1: RsaFixture = RsaFixture {
    pem: include_str!("../fixtures/vault-key-v1.pem"),
};

pub static VAULT_KEY_V2: RsaFixture = RsaFixture {
    pem: include_str!("../fixtures/vault-key-v2.pem"),
};

pub static UPSTREAM_KEY: RsaFixture = RsaFixture {
    pem: include_str!("../fixtures/upstream-authority.pem"),
};

impl RsaFixture {
    pub fn private_key(&self) -> RsaPrivateKey {
        RsaPrivateKey::from_pkcs1_pem(self.pem).expect("fixture PEM must parse")
    }

    /// Big-endian modulus, no leading zeros.
    pub fn modulus(&self) -> Vec<u8> {
        self.private_key().n().to_bytes_be()
    }

    /// Big-endian public exponent (65537).
    pub fn exponent(&self) -> Vec<u8> {
        self.private_key().e().to_bytes_be()
    }

    pub fn n_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.modulus())
    }

    pub fn e_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.exponent())
    }

    /// RSASSA-PKCS1-v1_5 over a precomputed SHA-256 digest, as the vault does.
    pub fn sign_digest(&self, digest: &[u8]) -> Vec<u8> {
        self.private_key()
            .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
            .expect("fixture signing must succeed")
    }

    /// RS256 signature of `message`.
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        self.sign_digest(&Sha256::digest(message))
    }

    /// Key for minting tokens with `jsonwebtoken`.
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_rsa_pem(self.pem.as_bytes()).expect("fixture PEM must load")
    }

    /// Enabled RSA-HSM vault key with this fixture's public half.
    pub fn vault_key(&self, name: &str, version: &str) -> KeyVaultKey {
        KeyVaultKey {
            name: name.to_string(),
            version: Some(version.to_string()),
            key_type: KeyType::RsaHsm,
            n: self.modulus(),
            e: self.exponent(),
            enabled: Some(true),
        }
    }

    /// JWK as an OIDC authority publishes it.
    pub fn jwk_json(&self, kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "use": "sig",
            "kid": kid,
            "n": self.n_b64(),
            "e": self.e_b64(),
        })
    }
}
