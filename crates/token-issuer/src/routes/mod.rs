//! HTTP routes and shared application state.

use crate::auth::{JwksClient, JwtValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::models::OidcMetadata;
use crate::repositories::{IdentityDirectory, KeyDirectory};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    /// Key custody service holding the signing key.
    pub key_directory: Arc<dyn KeyDirectory>,

    /// Group membership directory.
    pub identity_directory: Arc<dyn IdentityDirectory>,

    /// Discovery document, fixed by `WEBSITE_HOSTNAME`.
    pub metadata: OidcMetadata,

    /// HTTP client for the upstream authority's discovery and JWKS.
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Config,
        key_directory: Arc<dyn KeyDirectory>,
        identity_directory: Arc<dyn IdentityDirectory>,
        http_client: reqwest::Client,
    ) -> Self {
        let metadata = OidcMetadata::for_hostname(&config.public_hostname);
        Self {
            config,
            key_directory,
            identity_directory,
            metadata,
            http_client,
        }
    }
}

/// Build the application routes.
///
/// - `/.well-known/openid-configuration`, `/jwks` - public
/// - `/token` - requires a bearer token from the upstream authority
/// - `/health`, `/metrics` - operational
/// - TraceLayer, 30 second request timeout, HTTP metrics (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let jwks_client = Arc::new(JwksClient::new(
        state.http_client.clone(),
        &state.config.jwt_issuer,
        state.config.jwks_cache_ttl,
    ));
    let jwt_validator = Arc::new(JwtValidator::new(
        jwks_client,
        &state.config.jwt_issuer,
        &state.config.jwt_audience,
        state.config.jwt_clock_skew,
    ));
    let auth_state = Arc::new(AuthState { jwt_validator });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/.well-known/openid-configuration",
            get(handlers::handle_get_metadata),
        )
        .route("/jwks", get(handlers::handle_get_jwks))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/token", get(handlers::handle_get_token))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees every response)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
