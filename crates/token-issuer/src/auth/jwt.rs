//! Caller token validation.
//!
//! # Security
//!
//! - Tokens are size-checked before parsing
//! - Only RS256 is accepted
//! - `iss` and `aud` must match configuration; `exp`/`nbf` get clock-skew leeway
//! - Every rejection produces the same generic message

use crate::auth::claims::CallerClaims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::IssuerError;
use common::jwt::{extract_kid, validate_iat};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

fn invalid_token() -> IssuerError {
    IssuerError::InvalidToken("The access token is invalid or expired".to_string())
}

/// Validates bearer tokens from the upstream authority.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    /// Accepted `iss` values: the configured issuer with and without a trailing slash.
    issuers: Vec<String>,
    audience: String,
    clock_skew: Duration,
}

impl JwtValidator {
    pub fn new(
        jwks_client: Arc<JwksClient>,
        issuer: &str,
        audience: &str,
        clock_skew: Duration,
    ) -> Self {
        let trimmed = issuer.trim_end_matches('/');
        Self {
            jwks_client,
            issuers: vec![trimmed.to_string(), format!("{trimmed}/")],
            audience: audience.to_string(),
            clock_skew,
        }
    }

    /// Validate a JWT and return the caller's claims.
    ///
    /// 1. Size check and `kid` extraction
    /// 2. Key lookup in the authority's JWKS
    /// 3. RS256 signature, `iss`, `aud`, `exp` and `nbf`
    /// 4. `iat` not too far in the future
    #[instrument(skip_all, name = "issuer.auth.validate")]
    pub async fn validate(&self, token: &str) -> Result<CallerClaims, IssuerError> {
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "issuer.auth.jwt", error = ?e, "Token kid extraction failed");
            invalid_token()
        })?;

        let jwk = self.jwks_client.get_key(&kid).await?;
        let claims = self.verify_token(token, &jwk)?;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "issuer.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(invalid_token());
        }

        tracing::debug!(target: "issuer.auth.jwt", "Token validated successfully");
        Ok(claims)
    }

    fn verify_token(&self, token: &str, jwk: &Jwk) -> Result<CallerClaims, IssuerError> {
        if jwk.kty != "RSA" {
            tracing::warn!(target: "issuer.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
            return Err(invalid_token());
        }
        if let Some(alg) = &jwk.alg {
            if alg != "RS256" {
                tracing::warn!(target: "issuer.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
                return Err(invalid_token());
            }
        }

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::error!(target: "issuer.auth.jwt", "JWK missing RSA components");
            return Err(invalid_token());
        };

        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
            tracing::error!(target: "issuer.auth.jwt", error = %e, "Invalid JWK RSA components");
            invalid_token()
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&self.issuers);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = self.clock_skew.as_secs();

        let token_data = decode::<CallerClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "issuer.auth.jwt", error = %e, "Token verification failed");
            invalid_token()
        })?;

        Ok(token_data.claims)
    }
}
