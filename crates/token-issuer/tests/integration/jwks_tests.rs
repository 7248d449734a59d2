//! Integration tests for the published signing key set.

use issuer_test_utils::*;
use reqwest::StatusCode;
use std::sync::Arc;
use token_issuer::models::Jwks;

async fn get_jwks(server: &TestIssuerServer) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::get(format!("{}/jwks", server.url())).await?)
}

fn no_groups() -> Arc<MockIdentityDirectory> {
    Arc::new(MockIdentityDirectory::no_groups())
}

/// Only enabled versions are published, keyed by their version id.
#[tokio::test]
async fn test_jwks_publishes_enabled_versions_only() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
            .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1)
            .with_rsa_version(TEST_KEY_VERSION_2, false, &VAULT_KEY_V2),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let response = get_jwks(&server).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );
    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body,
        serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "use": "sig",
                "kid": TEST_KEY_VERSION_1,
                "n": VAULT_KEY_V1.n_b64(),
                "e": "AQAB",
            }]
        })
    );

    // The disabled version is never fetched.
    assert_eq!(server.keys().list_calls(), 1);
    assert_eq!(server.keys().get_key_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_jwks_publishes_every_enabled_version_in_listing_order() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
            .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1)
            .with_rsa_version(TEST_KEY_VERSION_2, true, &VAULT_KEY_V2),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let jwks: Jwks = get_jwks(&server).await?.json().await?;

    let kids: Vec<&str> = jwks.keys.iter().map(|k| k.kid.as_str()).collect();
    assert_eq!(kids, vec![TEST_KEY_VERSION_1, TEST_KEY_VERSION_2]);
    assert_ne!(jwks.keys[0].n, jwks.keys[1].n);

    Ok(())
}

/// Versions with no `enabled` attribute and non-RSA versions are left out.
#[tokio::test]
async fn test_jwks_skips_unattributed_and_non_rsa_versions() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
            .with_unattributed_version("unattributed", &VAULT_KEY_V2)
            .with_ec_version("ec-version")
            .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let response = get_jwks(&server).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let jwks: Jwks = response.json().await?;

    assert_eq!(jwks.keys.len(), 1);
    assert_eq!(jwks.keys[0].kid, TEST_KEY_VERSION_1);
    // EC version was fetched, then skipped.
    assert_eq!(server.keys().get_key_calls(), 2);

    Ok(())
}

#[tokio::test]
async fn test_jwks_empty_when_no_version_is_enabled() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).with_rsa_version(
            TEST_KEY_VERSION_1,
            false,
            &VAULT_KEY_V1,
        ),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let body: serde_json::Value = get_jwks(&server).await?.json().await?;

    assert_eq!(body, serde_json::json!({ "keys": [] }));

    Ok(())
}

/// A listing error after some versions were read yields no partial set.
#[tokio::test]
async fn test_jwks_listing_failure_returns_500() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
            .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1)
            .failing_listing(),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let response = get_jwks(&server).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "error": "failed to get signing keys" }));

    Ok(())
}

#[tokio::test]
async fn test_jwks_fetch_failure_returns_500() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
            .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1)
            .with_rsa_version(TEST_KEY_VERSION_2, true, &VAULT_KEY_V2)
            .failing_fetch(TEST_KEY_VERSION_2),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let response = get_jwks(&server).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"], "failed to get signing keys");
    // Vault error details stay server-side.
    assert!(!body.to_string().contains(TEST_KEY_VERSION_2));

    Ok(())
}

/// A published key must be usable; an RSA version with no modulus aborts the set.
#[tokio::test]
async fn test_jwks_rsa_version_without_modulus_returns_500() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
            .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1)
            .with_componentless_rsa_version(TEST_KEY_VERSION_2),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let response = get_jwks(&server).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "error": "failed to get signing keys" }));
    assert_eq!(server.keys().get_key_calls(), 2);

    Ok(())
}

/// Every request rebuilds the set from the vault; nothing is cached.
#[tokio::test]
async fn test_jwks_is_rebuilt_on_every_request() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).with_rsa_version(
            TEST_KEY_VERSION_1,
            true,
            &VAULT_KEY_V1,
        ),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let first: serde_json::Value = get_jwks(&server).await?.json().await?;
    let second: serde_json::Value = get_jwks(&server).await?.json().await?;

    assert_eq!(first, second);
    assert_eq!(server.keys().list_calls(), 2);
    assert_eq!(server.keys().get_key_calls(), 2);

    Ok(())
}

/// JWKS is public: no bearer token is needed.
#[tokio::test]
async fn test_jwks_ignores_authorization_header() -> Result<(), anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).with_rsa_version(
            TEST_KEY_VERSION_1,
            true,
            &VAULT_KEY_V1,
        ),
    );
    let server = TestIssuerServer::spawn(keys, no_groups()).await?;

    let response = reqwest::Client::new()
        .get(format!("{}/jwks", server.url()))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
