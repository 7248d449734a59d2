use crate::errors::IssuerError;
use crate::models::Jwks;
use crate::observability::metrics::{record_error, record_jwks_request};
use crate::observability::ErrorCategory;
use crate::routes::AppState;
use crate::services::jwks_service;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// GET /jwks
///
/// Lists the signing key's versions on every request: enablement can change
/// in the vault at any time, so the response is marked `no-cache`.
#[instrument(name = "issuer.jwks.get", skip_all, fields(status, key_count))]
pub async fn handle_get_jwks(
    State(state): State<Arc<AppState>>,
) -> Result<(HeaderMap, Json<Jwks>), IssuerError> {
    let result =
        jwks_service::get_jwks(state.key_directory.as_ref(), &state.config.signing_key_name).await;

    let span = tracing::Span::current();
    let jwks = match result {
        Ok(jwks) => {
            span.record("status", "success");
            span.record("key_count", jwks.keys.len());
            record_jwks_request("success", jwks.keys.len());
            jwks
        }
        Err(e) => {
            span.record("status", "error");
            record_jwks_request("error", 0);
            let e = e.context("failed to get signing keys");
            record_error("jwks", ErrorCategory::from(&e).as_str(), e.status_code());
            return Err(e);
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok((headers, Json(jwks)))
}
