//! Token Issuer
//!
//! Entry point for the OIDC group token issuer.

use common::token_credential::{
    ManagedIdentityConfig, ManagedIdentityCredential, TokenCredential,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use token_issuer::config::Config;
use token_issuer::repositories::{GraphClient, KeyVaultClient};
use token_issuer::routes::{self, AppState};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Outbound request timeout for Key Vault, Graph and the upstream authority.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_issuer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Token Issuer");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        public_hostname = %config.public_hostname,
        signing_key = %config.signing_key_name,
        "Configuration loaded successfully"
    );

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            e
        })?;

    let identity = match (&config.identity_endpoint, &config.identity_header) {
        (Some(endpoint), Some(header)) => {
            info!("Using App Service managed identity");
            ManagedIdentityConfig::app_service(
                endpoint.clone(),
                header.clone(),
                config.key_vault_client_id.clone(),
            )
        }
        _ => {
            info!("Using instance metadata managed identity");
            ManagedIdentityConfig::imds(config.key_vault_client_id.clone())
        }
    };
    let credential: Arc<dyn TokenCredential> =
        Arc::new(ManagedIdentityCredential::new(identity.with_http_timeout(HTTP_TIMEOUT))?);

    let key_vault = KeyVaultClient::new(
        http_client.clone(),
        &config.key_vault_url,
        credential.clone(),
    )?;
    let graph = GraphClient::new(http_client.clone(), &config.graph_base_url, credential);

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState::new(
        config,
        Arc::new(key_vault),
        Arc::new(graph),
        http_client,
    ));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Token Issuer listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Token Issuer shutdown complete");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
