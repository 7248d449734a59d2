//! Signing keys of the upstream authority.
//!
//! The JWKS location is read from the authority's
//! `/.well-known/openid-configuration` on every refresh, so a moved
//! `jwks_uri` is picked up together with rotated keys. Keys are cached
//! with a TTL; an unknown `kid` in a live cache is rejected without a fetch.

use crate::errors::IssuerError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// JSON Web Key published by the upstream authority.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,

    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    expires_at: Instant,
}

fn invalid_token() -> IssuerError {
    IssuerError::InvalidToken("The access token is invalid or expired".to_string())
}

/// Fetches and caches the upstream authority's JWKS.
pub struct JwksClient {
    discovery_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
}

impl JwksClient {
    /// `issuer` is the authority base URL; a trailing slash is ignored.
    pub fn new(http_client: reqwest::Client, issuer: &str, cache_ttl: Duration) -> Self {
        Self {
            discovery_url: format!(
                "{}/.well-known/openid-configuration",
                issuer.trim_end_matches('/')
            ),
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    /// Get the key for `kid`, refreshing the cache when it is empty or expired.
    ///
    /// # Errors
    ///
    /// `InvalidToken` if the key is unknown, `Dependency` if the authority
    /// cannot be reached.
    #[instrument(skip_all, name = "issuer.auth.jwks.get_key")]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, IssuerError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return cached.keys.get(kid).cloned().ok_or_else(|| {
                        tracing::debug!(target: "issuer.auth.jwks", kid = %kid, "Key not found in JWKS cache");
                        invalid_token()
                    });
                }
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| {
                tracing::warn!(target: "issuer.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                invalid_token()
            })
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, IssuerError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "issuer.auth.jwks", error = %e, url = %url, "Upstream authority request failed");
            IssuerError::Dependency(format!("upstream authority unreachable: {e}"))
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "issuer.auth.jwks",
                status = %response.status(),
                url = %url,
                "Upstream authority returned error"
            );
            return Err(IssuerError::Dependency(format!(
                "upstream authority returned {}",
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            tracing::error!(target: "issuer.auth.jwks", error = %e, url = %url, "Invalid upstream authority response");
            IssuerError::Dependency(format!("invalid upstream authority response: {e}"))
        })
    }

    async fn refresh_cache(&self) -> Result<(), IssuerError> {
        let discovery: DiscoveryDocument = self.fetch_json(&self.discovery_url).await?;
        let jwks: JwksResponse = self.fetch_json(&discovery.jwks_uri).await?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();

        tracing::info!(target: "issuer.auth.jwks", key_count = keys.len(), "JWKS cache refreshed");

        let expires_at = Instant::now().checked_add(self.cache_ttl).ok_or_else(|| {
            IssuerError::Internal(format!("JWKS cache TTL {:?} is out of range", self.cache_ttl))
        })?;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks { keys, expires_at });

        Ok(())
    }
}
