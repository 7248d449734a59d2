//! Azure Key Vault keys client.
//!
//! The issuer's signing key lives in Key Vault and never leaves it. This
//! client lists a key's versions, reads public material for one version and
//! asks the vault to sign a SHA-256 digest.
//!
//! Version listings are paginated by the vault (`nextLink`); they are exposed
//! as a lazy stream so callers pull one page at a time and can stop early.

use crate::crypto::SigningAlgorithm;
use crate::errors::IssuerError;
use crate::models::{KeyProperties, KeyType, KeyVaultKey};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::jwt::decode_rsa_component;
use common::secret::ExposeSecret;
use common::token_credential::{TokenCredential, KEY_VAULT_RESOURCE};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Key Vault data-plane API version.
pub const API_VERSION: &str = "7.4";

/// Operations the issuer needs from the key custody service.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Lazily enumerate the versions of `name`, following pagination.
    fn list_key_versions<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxStream<'a, Result<KeyProperties, IssuerError>>;

    /// Public material of one version, or of the current version when
    /// `version` is `None`.
    async fn get_key(&self, name: &str, version: Option<&str>)
        -> Result<KeyVaultKey, IssuerError>;

    /// Sign a precomputed digest with the private half of `name/version`.
    async fn sign(
        &self,
        name: &str,
        version: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, IssuerError>;
}

#[derive(Deserialize)]
struct KeyAttributes {
    #[serde(default)]
    enabled: Option<bool>,
}

#[derive(Deserialize)]
struct KeyItem {
    kid: String,
    #[serde(default)]
    attributes: Option<KeyAttributes>,
}

#[derive(Deserialize)]
struct KeyListPage {
    #[serde(default)]
    value: Vec<KeyItem>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct JsonWebKeyMaterial {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Deserialize)]
struct KeyBundle {
    key: JsonWebKeyMaterial,
    #[serde(default)]
    attributes: Option<KeyAttributes>,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    alg: &'a str,
    value: String,
}

#[derive(Deserialize)]
struct SignResult {
    value: String,
}

/// Split a key identifier (`https://{vault}/keys/{name}/{version}`) into
/// name and optional version.
pub fn parse_key_identifier(kid: &str) -> Option<(String, Option<String>)> {
    let url = Url::parse(kid).ok()?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    if segments.next()? != "keys" {
        return None;
    }
    let name = segments.next()?.to_string();
    let version = segments.next().map(ToString::to_string);
    if segments.next().is_some() {
        return None;
    }
    Some((name, version))
}

fn decode_component(value: Option<&str>, field: &str) -> Result<Vec<u8>, IssuerError> {
    match value {
        None => Ok(Vec::new()),
        Some(v) => decode_rsa_component(v).map_err(|e| {
            IssuerError::Dependency(format!("key vault returned invalid '{field}': {e}"))
        }),
    }
}

/// REST client for one vault.
pub struct KeyVaultClient {
    http_client: Client,
    vault_url: Url,
    credential: Arc<dyn TokenCredential>,
}

impl KeyVaultClient {
    /// `vault_url` is the vault base URL, e.g. `https://issuer-kv.vault.azure.net`.
    pub fn new(
        http_client: Client,
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, IssuerError> {
        let vault_url = Url::parse(vault_url)
            .map_err(|e| IssuerError::Internal(format!("invalid key vault url: {e}")))?;
        Ok(Self {
            http_client,
            vault_url,
            credential,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.vault_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/'),
            API_VERSION
        )
    }

    /// Only follow pagination links that point back at this vault.
    fn checked_next_link(&self, link: &str) -> Result<String, IssuerError> {
        let next = Url::parse(link)
            .map_err(|e| IssuerError::Dependency(format!("invalid nextLink: {e}")))?;
        if next.origin() != self.vault_url.origin() {
            warn!(
                target: "issuer.repo.key_vault",
                next_host = ?next.host_str(),
                "Refusing to follow nextLink outside the vault"
            );
            return Err(IssuerError::Dependency(
                "nextLink points outside the key vault".to_string(),
            ));
        }
        Ok(next.into())
    }

    async fn bearer(&self) -> Result<String, IssuerError> {
        let token = self
            .credential
            .get_token(KEY_VAULT_RESOURCE)
            .await
            .map_err(|e| {
                error!(target: "issuer.repo.key_vault", error = %e, "Failed to acquire key vault token");
                IssuerError::Dependency(format!("key vault token acquisition failed: {e}"))
            })?;
        Ok(format!("Bearer {}", token.token.expose_secret()))
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, IssuerError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                error!(target: "issuer.repo.key_vault", operation, error = %e, "Failed to parse key vault response");
                IssuerError::Dependency(format!("{operation}: invalid response body: {e}"))
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                warn!(target: "issuer.repo.key_vault", operation, status = %status, "Key vault returned server error");
            } else {
                warn!(target: "issuer.repo.key_vault", operation, status = %status, body = %body, "Key vault rejected request");
            }
            Err(IssuerError::Dependency(format!(
                "{operation}: key vault returned {status}"
            )))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        operation: &'static str,
    ) -> Result<T, IssuerError> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", self.bearer().await?)
            .send()
            .await
            .map_err(|e| {
                error!(target: "issuer.repo.key_vault", operation, error = %e, "Key vault request failed");
                IssuerError::Dependency(format!("{operation}: {e}"))
            })?;
        Self::handle_response(response, operation).await
    }

    async fn fetch_page(
        &self,
        url: String,
        name: &str,
    ) -> Result<(Vec<Result<KeyProperties, IssuerError>>, Option<String>), IssuerError> {
        debug!(target: "issuer.repo.key_vault", "Fetching key version page");
        let page: KeyListPage = self.get_json(&url, "list key versions").await?;

        let next = match page.next_link.as_deref().filter(|l| !l.is_empty()) {
            Some(link) => Some(self.checked_next_link(link)?),
            None => None,
        };

        let items = page
            .value
            .into_iter()
            .map(|item| {
                let (listed_name, version) = parse_key_identifier(&item.kid)
                    .unwrap_or_else(|| (name.to_string(), None));
                Ok(KeyProperties {
                    name: listed_name,
                    version,
                    enabled: item.attributes.and_then(|a| a.enabled),
                })
            })
            .collect();

        Ok((items, next))
    }
}

#[async_trait]
impl KeyDirectory for KeyVaultClient {
    fn list_key_versions<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxStream<'a, Result<KeyProperties, IssuerError>> {
        let first = self.endpoint(&format!("keys/{name}/versions"));

        stream::try_unfold(Some(first), move |cursor| async move {
            let Some(url) = cursor else {
                return Ok::<_, IssuerError>(None);
            };
            let (items, next) = self.fetch_page(url, name).await?;
            Ok::<_, IssuerError>(Some((stream::iter(items), next)))
        })
        .try_flatten()
        .boxed()
    }

    #[instrument(skip_all, name = "key_vault.get_key")]
    async fn get_key(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<KeyVaultKey, IssuerError> {
        let path = match version {
            Some(v) => format!("keys/{name}/{v}"),
            None => format!("keys/{name}"),
        };
        let bundle: KeyBundle = self.get_json(&self.endpoint(&path), "get key").await?;

        let resolved_version = parse_key_identifier(&bundle.key.kid)
            .and_then(|(_, v)| v)
            .or_else(|| version.map(ToString::to_string));

        Ok(KeyVaultKey {
            name: name.to_string(),
            version: resolved_version,
            key_type: KeyType::from(bundle.key.kty.as_str()),
            n: decode_component(bundle.key.n.as_deref(), "n")?,
            e: decode_component(bundle.key.e.as_deref(), "e")?,
            enabled: bundle.attributes.and_then(|a| a.enabled),
        })
    }

    #[instrument(skip_all, name = "key_vault.sign", fields(alg = %algorithm))]
    async fn sign(
        &self,
        name: &str,
        version: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, IssuerError> {
        let url = self.endpoint(&format!("keys/{name}/{version}/sign"));
        let request = SignRequest {
            alg: algorithm.name(),
            value: URL_SAFE_NO_PAD.encode(digest),
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", self.bearer().await?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(target: "issuer.repo.key_vault", error = %e, "Key vault sign request failed");
                IssuerError::Dependency(format!("sign: {e}"))
            })?;

        let result: SignResult = Self::handle_response(response, "sign").await?;
        decode_component(Some(&result.value), "value")
    }
}
