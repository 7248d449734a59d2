//! Integration tests for bearer authentication on `/token`.
//!
//! Every rejection is a 401 with a `WWW-Authenticate` challenge and never
//! reaches the identity directory or the vault.

use issuer_test_utils::*;
use reqwest::StatusCode;
use std::sync::Arc;

async fn spawn() -> Result<TestIssuerServer, anyhow::Error> {
    let keys = Arc::new(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).with_rsa_version(
            TEST_KEY_VERSION_1,
            true,
            &VAULT_KEY_V1,
        ),
    );
    let groups = Arc::new(MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]));
    TestIssuerServer::spawn(keys, groups).await
}

fn token_url(server: &TestIssuerServer) -> String {
    format!(
        "{}/token?group_object_id={}",
        server.url(),
        TEST_GROUP_DEPLOYERS
    )
}

/// 401 with the bearer challenge; returns the error message.
async fn assert_unauthorized(
    server: &TestIssuerServer,
    response: reqwest::Response,
) -> Result<String, anyhow::Error> {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok()),
        Some("Bearer realm=\"token-issuer\", error=\"invalid_token\"")
    );
    let body: serde_json::Value = response.json().await?;
    assert_eq!(server.groups().calls(), 0);
    assert_eq!(server.keys().sign_calls(), 0);
    body["error"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow::anyhow!("401 body has no error message: {body}"))
}

async fn assert_invalid_token(
    server: &TestIssuerServer,
    response: reqwest::Response,
) -> Result<(), anyhow::Error> {
    let message = assert_unauthorized(server, response).await?;
    assert_eq!(message, "The access token is invalid or expired");
    Ok(())
}

#[tokio::test]
async fn test_token_requires_authorization_header() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    let response = reqwest::get(token_url(&server)).await?;

    let message = assert_unauthorized(&server, response).await?;
    assert_eq!(message, "Missing Authorization header");
    Ok(())
}

#[tokio::test]
async fn test_token_rejects_non_bearer_scheme() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .basic_auth("user", Some("pass"))
        .send()
        .await?;

    let message = assert_unauthorized(&server, response).await?;
    assert_eq!(message, "Invalid Authorization header format");
    Ok(())
}

#[tokio::test]
async fn test_token_rejects_malformed_bearer() -> Result<(), anyhow::Error> {
    let server = spawn().await?;

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .bearer_auth("not.a.jwt")
        .send()
        .await?;

    assert_invalid_token(&server, response).await
}

#[tokio::test]
async fn test_token_rejects_expired_bearer() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let token = server.caller_token().expires_in(-3600).sign();

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .bearer_auth(token)
        .send()
        .await?;

    assert_invalid_token(&server, response).await
}

#[tokio::test]
async fn test_token_rejects_wrong_audience() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let token = server
        .caller_token()
        .with_audience("api://some-other-app")
        .sign();

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .bearer_auth(token)
        .send()
        .await?;

    assert_invalid_token(&server, response).await
}

#[tokio::test]
async fn test_token_rejects_wrong_issuer() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let token = CallerTokenBuilder::new("https://login.evil.example").sign();

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .bearer_auth(token)
        .send()
        .await?;

    assert_invalid_token(&server, response).await
}

/// Signed by a key the upstream authority does not publish under that kid.
#[tokio::test]
async fn test_token_rejects_forged_signature() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let token = server.caller_token().sign_with(&VAULT_KEY_V2);

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .bearer_auth(token)
        .send()
        .await?;

    assert_invalid_token(&server, response).await
}

#[tokio::test]
async fn test_token_rejects_unknown_kid() -> Result<(), anyhow::Error> {
    let server = spawn().await?;
    let token = server.caller_token().with_kid("rotated-away").sign();

    let response = reqwest::Client::new()
        .get(token_url(&server))
        .bearer_auth(token)
        .send()
        .await?;

    assert_invalid_token(&server, response).await
}
