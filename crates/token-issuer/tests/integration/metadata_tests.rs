//! Integration tests for the OIDC discovery document.

use issuer_test_utils::*;
use reqwest::StatusCode;
use std::sync::Arc;

#[tokio::test]
async fn test_metadata_document() -> Result<(), anyhow::Error> {
    let keys = Arc::new(MockKeyDirectory::new(TEST_SIGNING_KEY_NAME));
    let server = TestIssuerServer::spawn(keys, Arc::new(MockIdentityDirectory::no_groups())).await?;

    let response = reqwest::get(format!(
        "{}/.well-known/openid-configuration",
        server.url()
    ))
    .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body,
        serde_json::json!({
            "issuer": "https://auth.example.com",
            "jwks_uri": "https://auth.example.com/jwks"
        })
    );

    Ok(())
}

/// Served from startup state, even when the vault is failing.
#[tokio::test]
async fn test_metadata_does_not_touch_key_vault() -> Result<(), anyhow::Error> {
    let keys = Arc::new(MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).failing_listing());
    let server = TestIssuerServer::spawn(keys, Arc::new(MockIdentityDirectory::failing())).await?;

    let client = reqwest::Client::new();
    for _ in 0..3 {
        let response = client
            .get(format!("{}/.well-known/openid-configuration", server.url()))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(server.keys().list_calls(), 0);
    assert_eq!(server.groups().calls(), 0);

    Ok(())
}
