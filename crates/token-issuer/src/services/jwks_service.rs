use crate::errors::IssuerError;
use crate::models::{JsonWebKey, Jwks, KeyVaultKey};
use crate::repositories::KeyDirectory;
use common::jwt::{encode_rsa_component, trim_leading_zeros};
use futures::TryStreamExt;
use tracing::{debug, instrument};

/// Build the JWKS from every enabled RSA version of `key_name`.
///
/// Versions are pulled page by page as the listing is consumed. Disabled
/// versions (or ones whose enablement is unknown) are skipped, as are
/// non-RSA keys. The first listing or fetch error aborts the whole build.
#[instrument(skip_all, name = "issuer.jwks.build")]
pub async fn get_jwks(directory: &dyn KeyDirectory, key_name: &str) -> Result<Jwks, IssuerError> {
    let mut versions = directory.list_key_versions(key_name);
    let mut keys = Vec::new();

    while let Some(properties) = versions.try_next().await? {
        if !properties.is_enabled() {
            debug!(target: "issuer.jwks", version = ?properties.version, "Skipping disabled key version");
            continue;
        }

        let version = properties.version.ok_or_else(|| {
            IssuerError::Dependency(format!(
                "listed version of key '{}' has no version identifier",
                properties.name
            ))
        })?;

        let key = directory.get_key(key_name, Some(&version)).await?;
        match to_jwk(&key)? {
            Some(jwk) => keys.push(jwk),
            None => {
                debug!(target: "issuer.jwks", version = %version, kty = %key.key_type, "Skipping non-RSA key version");
            }
        }
    }

    debug!(target: "issuer.jwks", key_count = keys.len(), "JWKS built");
    Ok(Jwks { keys })
}

/// JWK for an RSA key version. `None` for other key types or a key without a version.
///
/// An RSA key missing its modulus or exponent is a dependency error.
fn to_jwk(key: &KeyVaultKey) -> Result<Option<JsonWebKey>, IssuerError> {
    if !key.key_type.is_rsa() {
        return Ok(None);
    }
    let Some(kid) = key.version.clone() else {
        return Ok(None);
    };
    if trim_leading_zeros(&key.n).is_empty() || trim_leading_zeros(&key.e).is_empty() {
        return Err(IssuerError::Dependency(format!(
            "RSA key '{}' version {kid} has no usable modulus or exponent",
            key.name
        )));
    }
    Ok(Some(JsonWebKey {
        kty: "RSA".to_string(),
        use_: "sig".to_string(),
        kid,
        n: encode_rsa_component(&key.n),
        e: encode_rsa_component(&key.e),
    }))
}
