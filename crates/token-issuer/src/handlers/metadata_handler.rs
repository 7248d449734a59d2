use crate::models::OidcMetadata;
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

/// GET /.well-known/openid-configuration
///
/// The document is computed once at startup from `WEBSITE_HOSTNAME`.
#[instrument(skip_all, name = "issuer.metadata.get")]
pub async fn handle_get_metadata(State(state): State<Arc<AppState>>) -> Json<OidcMetadata> {
    Json(state.metadata.clone())
}
