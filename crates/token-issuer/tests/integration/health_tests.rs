//! Integration tests for the operational endpoints.

use issuer_test_utils::*;
use reqwest::StatusCode;
use std::sync::Arc;

fn keys() -> Arc<MockKeyDirectory> {
    Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).with_rsa_version(
            TEST_KEY_VERSION_1,
            true,
            &VAULT_KEY_V1,
        ),
    )
}

/// Liveness probe returns a fixed body and touches no dependency.
#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn(keys(), Arc::new(MockIdentityDirectory::no_groups())).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");
    assert_eq!(server.keys().list_calls(), 0);
    assert_eq!(server.keys().get_key_calls(), 0);
    assert_eq!(server.groups().calls(), 0);

    Ok(())
}

/// The metrics endpoint is public and serves the Prometheus text format.
#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn(keys(), Arc::new(MockIdentityDirectory::no_groups())).await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    // Body content depends on which recorder won the process-wide install.
    let _ = response.text().await?;

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn(keys(), Arc::new(MockIdentityDirectory::no_groups())).await?;

    let response = reqwest::get(format!("{}/api/v1/unknown", server.url())).await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
