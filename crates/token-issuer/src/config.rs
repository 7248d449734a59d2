//! Token issuer configuration.
//!
//! Loaded from environment variables at process start. Any missing required
//! value aborts startup. The App Service identity header is redacted in
//! Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com";

/// Default lifetime of the cached upstream authority key set.
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(300);

/// Upper bound for `JWKS_CACHE_TTL_SECONDS` (one day).
pub const MAX_JWKS_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Key Vault key names: 1 to 127 characters of `[0-9a-zA-Z-]`.
const MAX_KEY_NAME_LEN: usize = 127;

#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Authority that issues the bearer tokens presented to `/token`.
    pub jwt_issuer: String,

    /// Audience those bearer tokens must carry.
    pub jwt_audience: String,

    /// Key Vault base URL, without a trailing slash.
    pub key_vault_url: String,

    /// Name of the Key Vault key used to sign issued tokens.
    pub signing_key_name: String,

    /// Client id of a user-assigned managed identity.
    pub key_vault_client_id: Option<String>,

    /// Public hostname of this service, used for `iss` and `jwks_uri`.
    pub public_hostname: String,

    pub graph_base_url: String,

    /// App Service managed identity endpoint. IMDS is used when absent.
    pub identity_endpoint: Option<String>,

    pub identity_header: Option<SecretString>,

    /// Leeway applied to inbound bearer `exp`, `nbf` and `iat`.
    pub jwt_clock_skew: Duration,

    pub jwks_cache_ttl: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("key_vault_url", &self.key_vault_url)
            .field("signing_key_name", &self.signing_key_name)
            .field("key_vault_client_id", &self.key_vault_client_id)
            .field("public_hostname", &self.public_hostname)
            .field("graph_base_url", &self.graph_base_url)
            .field("identity_endpoint", &self.identity_endpoint)
            .field(
                "identity_header",
                &self.identity_header.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("Invalid signing key name: {0}")]
    InvalidKeyName(String),

    #[error("Invalid public hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Parse an http(s) base URL and return it without a trailing slash.
fn base_url(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ConfigError::InvalidUrl {
            name,
            reason: "must not contain a query or fragment".to_string(),
        });
    }

    Ok(value.trim_end_matches('/').to_string())
}

fn validate_key_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty()
        || name.len() > MAX_KEY_NAME_LEN
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::InvalidKeyName(format!(
            "'{name}' must be 1-{MAX_KEY_NAME_LEN} characters of 0-9, a-z, A-Z or '-'"
        )));
    }
    Ok(())
}

fn validate_hostname(host: &str) -> Result<(), ConfigError> {
    if host.contains("://") || host.contains('/') || host.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidHostname(format!(
            "'{host}' must be a bare host name such as auth.example.com"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_issuer = required(vars, "JWT_ISSUER")?;
        base_url("JWT_ISSUER", &jwt_issuer)?;

        let jwt_audience = required(vars, "JWT_AUDIENCE")?;

        let key_vault_url = base_url("KEY_VAULT_URL", &required(vars, "KEY_VAULT_URL")?)?;

        let signing_key_name = required(vars, "KEY_VAULT_OPENID_CONNECT_JWKS")?;
        validate_key_name(&signing_key_name)?;

        let public_hostname = required(vars, "WEBSITE_HOSTNAME")?;
        validate_hostname(&public_hostname)?;

        let key_vault_client_id = optional(vars, "KEY_VAULT_CLIENT_ID");

        let bind_address =
            optional(vars, "BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let graph_base_url = match optional(vars, "GRAPH_BASE_URL") {
            Some(value) => base_url("GRAPH_BASE_URL", &value)?,
            None => DEFAULT_GRAPH_BASE_URL.to_string(),
        };

        // App Service sets both; either alone is unusable.
        let (identity_endpoint, identity_header) = match (
            optional(vars, "IDENTITY_ENDPOINT"),
            optional(vars, "IDENTITY_HEADER"),
        ) {
            (Some(endpoint), Some(header)) => (
                Some(base_url("IDENTITY_ENDPOINT", &endpoint)?),
                Some(SecretString::from(header)),
            ),
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("IDENTITY_HEADER".into())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("IDENTITY_ENDPOINT".into())),
            (None, None) => (None, None),
        };

        let jwt_clock_skew = if let Some(value_str) = optional(vars, "JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {value}",
                    MAX_CLOCK_SKEW.as_secs()
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let jwks_cache_ttl = if let Some(value_str) = optional(vars, "JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;
            if value == 0 {
                return Err(ConfigError::InvalidJwksCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }
            if value > MAX_JWKS_CACHE_TTL.as_secs() {
                return Err(ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must not exceed {} seconds, got {value}",
                    MAX_JWKS_CACHE_TTL.as_secs()
                )));
            }
            Duration::from_secs(value)
        } else {
            DEFAULT_JWKS_CACHE_TTL
        };

        Ok(Config {
            bind_address,
            jwt_issuer,
            jwt_audience,
            key_vault_url,
            signing_key_name,
            key_vault_client_id,
            public_hostname,
            graph_base_url,
            identity_endpoint,
            identity_header,
            jwt_clock_skew,
            jwks_cache_ttl,
        })
    }
}
