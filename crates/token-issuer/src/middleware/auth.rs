//! Bearer authentication for protected routes.
//!
//! Validates the caller's token against the upstream authority and inserts
//! [`CallerClaims`] into request extensions.

use crate::auth::{CallerClaims, JwtValidator};
use crate::errors::IssuerError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_validator: Arc<JwtValidator>,
}

fn extract_bearer_token(req: &Request) -> Result<&str, IssuerError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "issuer.middleware.auth", "Missing Authorization header");
            IssuerError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "issuer.middleware.auth", "Invalid Authorization header format");
            IssuerError::InvalidToken("Invalid Authorization header format".to_string())
        })
}

/// Reject requests without a valid bearer token (401).
#[instrument(skip_all, name = "issuer.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, IssuerError> {
    let token = extract_bearer_token(&req)?;
    let claims: CallerClaims = state.jwt_validator.validate(token).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
