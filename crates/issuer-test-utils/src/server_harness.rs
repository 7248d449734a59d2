//! Test server harness for E2E testing
//!
//! [`TestIssuerServer`] runs the real router on `127.0.0.1:0` with in-memory
//! directories and a wiremock upstream authority serving discovery and JWKS.

use crate::crypto_fixtures::UPSTREAM_KEY;
use crate::mocks::{MockIdentityDirectory, MockKeyDirectory};
use crate::test_ids::{TEST_AUDIENCE, TEST_HOSTNAME, TEST_SIGNING_KEY_NAME, TEST_UPSTREAM_KID};
use crate::token_builders::CallerTokenBuilder;
use common::jwt::DEFAULT_CLOCK_SKEW;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use token_issuer::config::{Config, DEFAULT_BIND_ADDRESS, DEFAULT_GRAPH_BASE_URL};
use token_issuer::routes::{self, AppState};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test harness for spawning the issuer in E2E tests
///
/// # Example
/// ```rust,ignore
/// let keys = Arc::new(MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
///     .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1));
/// let groups = Arc::new(MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]));
/// let server = TestIssuerServer::spawn(keys, groups).await?;
///
/// let response = reqwest::Client::new()
///     .get(format!("{}/token?group_object_id={}", server.url(), TEST_GROUP_DEPLOYERS))
///     .bearer_auth(server.caller_token().sign())
///     .send()
///     .await?;
/// ```
pub struct TestIssuerServer {
    addr: SocketAddr,
    upstream: MockServer,
    config: Config,
    keys: Arc<MockKeyDirectory>,
    groups: Arc<MockIdentityDirectory>,
    _handle: JoinHandle<()>,
}

impl TestIssuerServer {
    pub async fn spawn(
        keys: Arc<MockKeyDirectory>,
        groups: Arc<MockIdentityDirectory>,
    ) -> Result<Self, anyhow::Error> {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": upstream.uri(),
                "jwks_uri": format!("{}/discovery/keys", upstream.uri()),
            })))
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .and(path("/discovery/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [UPSTREAM_KEY.jwk_json(TEST_UPSTREAM_KID)]
            })))
            .mount(&upstream)
            .await;

        let config = Config {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            jwt_issuer: upstream.uri(),
            jwt_audience: TEST_AUDIENCE.to_string(),
            key_vault_url: "https://issuer-tests.vault.azure.net".to_string(),
            signing_key_name: TEST_SIGNING_KEY_NAME.to_string(),
            key_vault_client_id: None,
            public_hostname: TEST_HOSTNAME.to_string(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            identity_endpoint: None,
            identity_header: None,
            jwt_clock_skew: DEFAULT_CLOCK_SKEW,
            jwks_cache_ttl: Duration::from_secs(300),
        };

        let state = Arc::new(AppState::new(
            config.clone(),
            keys.clone(),
            groups.clone(),
            reqwest::Client::new(),
        ));

        // The global recorder can only be installed once per process.
        let metrics_handle = match routes::init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            upstream,
            config,
            keys,
            groups,
            _handle: handle,
        })
    }

    /// Base URL of the issuer
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Issuer URL of the wiremock upstream authority
    pub fn upstream_issuer(&self) -> String {
        self.upstream.uri()
    }

    pub fn keys(&self) -> &MockKeyDirectory {
        &self.keys
    }

    pub fn groups(&self) -> &MockIdentityDirectory {
        &self.groups
    }

    /// Builder for a valid caller token accepted by this server
    pub fn caller_token(&self) -> CallerTokenBuilder {
        CallerTokenBuilder::new(&self.upstream_issuer())
    }
}

impl Drop for TestIssuerServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
