//! Azure managed identity access tokens.
//!
//! The issuer talks to Key Vault and Microsoft Graph with bearer tokens
//! obtained from the hosting platform's managed identity endpoint:
//!
//! - App Service / Functions: `IDENTITY_ENDPOINT` plus the `X-IDENTITY-HEADER`
//!   secret (`api-version=2019-08-01`)
//! - Everywhere else: the instance metadata service (IMDS,
//!   `api-version=2018-02-01`)
//!
//! Tokens are cached per resource and reacquired once they are within
//! [`DEFAULT_EXPIRY_MARGIN`] of expiry. Acquisition is never retried here; a
//! failure surfaces to the caller immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_credential::{
//!     ManagedIdentityConfig, ManagedIdentityCredential, TokenCredential, KEY_VAULT_RESOURCE,
//! };
//!
//! let credential = ManagedIdentityCredential::new(ManagedIdentityConfig::imds(None))?;
//! let token = credential.get_token(KEY_VAULT_RESOURCE).await?;
//! let header = format!("Bearer {}", token.token.expose_secret());
//! ```

use crate::secret::{ExposeSecret, SecretString};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace, warn};

/// Resource identifier for Azure Key Vault data-plane calls.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Resource identifier for Microsoft Graph.
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com";

/// IMDS token endpoint.
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached tokens are refreshed this long before they expire.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while acquiring an access token.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Transport failure or unexpected status.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// The identity endpoint refused the request (400, 401, 403).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The response body could not be understood.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A bearer token and its absolute expiry (Unix seconds).
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_on: i64,
}

impl AccessToken {
    /// True if the token is still usable `margin` from now.
    #[must_use]
    pub fn is_fresh(&self, margin: Duration, now: i64) -> bool {
        #[allow(clippy::cast_possible_wrap)]
        let margin_secs = margin.as_secs() as i64;
        self.expires_on.saturating_sub(margin_secs) > now
    }
}

/// Source of bearer tokens for outbound Azure calls.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a token for `resource` (e.g. [`KEY_VAULT_RESOURCE`]).
    async fn get_token(&self, resource: &str) -> Result<AccessToken, TokenError>;
}

/// Which managed identity endpoint to call.
#[derive(Clone)]
pub enum IdentitySource {
    AppService {
        endpoint: String,
        header: SecretString,
    },
    Imds {
        endpoint: String,
    },
}

impl std::fmt::Debug for IdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AppService { endpoint, .. } => f
                .debug_struct("AppService")
                .field("endpoint", endpoint)
                .field("header", &"[REDACTED]")
                .finish(),
            Self::Imds { endpoint } => f.debug_struct("Imds").field("endpoint", endpoint).finish(),
        }
    }
}

/// Configuration for [`ManagedIdentityCredential`].
#[derive(Clone, Debug)]
pub struct ManagedIdentityConfig {
    pub source: IdentitySource,

    /// Client id of a user-assigned identity. `None` selects the
    /// system-assigned identity.
    pub client_id: Option<String>,

    pub http_timeout: Duration,
    pub expiry_margin: Duration,
}

impl ManagedIdentityConfig {
    /// App Service identity endpoint.
    #[must_use]
    pub fn app_service(endpoint: String, header: SecretString, client_id: Option<String>) -> Self {
        Self::with_source(IdentitySource::AppService { endpoint, header }, client_id)
    }

    /// Instance metadata service at its well-known address.
    #[must_use]
    pub fn imds(client_id: Option<String>) -> Self {
        Self::with_source(
            IdentitySource::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
            client_id,
        )
    }

    fn with_source(source: IdentitySource, client_id: Option<String>) -> Self {
        Self {
            source,
            client_id,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            expiry_margin: DEFAULT_EXPIRY_MARGIN,
        }
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// `expires_on` is a string on App Service and IMDS, a number on some hosts.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresOn {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    expires_on: ExpiresOn,
}

impl std::fmt::Debug for ManagedIdentityTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIdentityTokenResponse")
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Managed identity token provider with a per-resource cache.
pub struct ManagedIdentityCredential {
    config: ManagedIdentityConfig,
    http_client: reqwest::Client,
    cache: RwLock<HashMap<String, AccessToken>>,
}

impl ManagedIdentityCredential {
    /// Create a credential with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: ManagedIdentityConfig) -> Result<Self, TokenError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
            cache: RwLock::new(HashMap::new()),
        })
    }

    async fn cached(&self, resource: &str) -> Option<AccessToken> {
        let now = chrono::Utc::now().timestamp();
        self.cache
            .read()
            .await
            .get(resource)
            .filter(|t| t.is_fresh(self.config.expiry_margin, now))
            .cloned()
    }

    #[instrument(skip_all, fields(resource = %resource))]
    async fn acquire(&self, resource: &str) -> Result<AccessToken, TokenError> {
        let mut query: Vec<(&str, &str)> = vec![("resource", resource)];
        if let Some(client_id) = self.config.client_id.as_deref() {
            query.push(("client_id", client_id));
        }

        let request = match &self.config.source {
            IdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http_client
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header.expose_secret())
            }
            IdentitySource::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http_client.get(endpoint).header("Metadata", "true")
            }
        };

        debug!(target: "common.token_credential", "Requesting managed identity token");

        let response = request.query(&query).send().await.map_err(|e| {
            debug!(target: "common.token_credential", error = %e, "HTTP request failed");
            TokenError::HttpError(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            let body: ManagedIdentityTokenResponse = response.json().await.map_err(|e| {
                warn!(target: "common.token_credential", error = %e, "Failed to parse token response");
                TokenError::InvalidResponse(e.to_string())
            })?;

            let expires_on = match body.expires_on {
                ExpiresOn::Number(n) => n,
                ExpiresOn::Text(s) => s.trim().parse::<i64>().map_err(|e| {
                    warn!(target: "common.token_credential", error = %e, "Unparseable expires_on");
                    TokenError::InvalidResponse(format!("invalid expires_on: {e}"))
                })?,
            };

            debug!(
                target: "common.token_credential",
                expires_on = expires_on,
                "Managed identity token acquired"
            );

            Ok(AccessToken {
                token: SecretString::from(body.access_token),
                expires_on,
            })
        } else if matches!(status.as_u16(), 400 | 401 | 403) {
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "common.token_credential", error = %e, "Failed to read error response body");
                String::new()
            });
            warn!(
                target: "common.token_credential",
                status = %status,
                "Identity endpoint rejected token request"
            );
            trace!(target: "common.token_credential", body = %body, "Rejection body");
            Err(TokenError::AuthenticationRejected(format!("Status {status}")))
        } else {
            warn!(
                target: "common.token_credential",
                status = %status,
                "Unexpected response from identity endpoint"
            );
            Err(TokenError::HttpError(format!("Unexpected status: {status}")))
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, TokenError> {
        if let Some(token) = self.cached(resource).await {
            trace!(target: "common.token_credential", resource = %resource, "Using cached token");
            return Ok(token);
        }

        let token = self.acquire(resource).await?;
        self.cache
            .write()
            .await
            .insert(resource.to_string(), token.clone());
        Ok(token)
    }
}

/// Fixed bearer token, for local development against emulators and for tests.
#[derive(Clone, Debug)]
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _resource: &str) -> Result<AccessToken, TokenError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: i64::MAX,
        })
    }
}
