//! Integration tests for group token issuance.
//!
//! Request validation happens before any directory call, membership is
//! checked before the vault is touched, and a successful token verifies
//! against the key published under its `kid`.

use issuer_test_utils::*;
use reqwest::StatusCode;
use std::sync::Arc;
use token_issuer::models::{Jwks, TokenResponse};

fn single_key() -> MockKeyDirectory {
    MockKeyDirectory::new(TEST_SIGNING_KEY_NAME).with_rsa_version(
        TEST_KEY_VERSION_1,
        true,
        &VAULT_KEY_V1,
    )
}

async fn spawn(
    keys: MockKeyDirectory,
    groups: MockIdentityDirectory,
) -> Result<TestIssuerServer, anyhow::Error> {
    TestIssuerServer::spawn(Arc::new(keys), Arc::new(groups)).await
}

async fn request_token(
    server: &TestIssuerServer,
    query: &str,
    bearer: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .get(format!("{}/token{}", server.url(), query))
        .bearer_auth(bearer)
        .send()
        .await?)
}

async fn assert_error(
    response: reqwest::Response,
    status: StatusCode,
    message: &str,
) -> Result<(), anyhow::Error> {
    assert_eq!(response.status(), status);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "error": message }));
    Ok(())
}

fn assert_no_directory_calls(server: &TestIssuerServer) {
    assert_eq!(server.groups().calls(), 0, "identity directory must not be called");
    assert_eq!(server.keys().get_key_calls(), 0, "vault must not be called");
    assert_eq!(server.keys().sign_calls(), 0, "vault must not be called");
}

// ============================================================================
// Success
// ============================================================================

#[tokio::test]
async fn test_member_receives_signed_group_token() -> Result<(), anyhow::Error> {
    let server = spawn(
        single_key(),
        MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]),
    )
    .await?;
    let bearer = server.caller_token().sign();

    let response = request_token(
        &server,
        &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
        &bearer,
    )
    .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: TokenResponse = response.json().await?;
    assert_eq!(body.requestor_object_id, TEST_CALLER_ALICE);
    assert_eq!(body.requested_group_object_id, TEST_GROUP_DEPLOYERS);

    body.access_token
        .assert_valid_jwt()
        .assert_signed_by(TEST_KEY_VERSION_1)
        .assert_verifies_with(&VAULT_KEY_V1)
        .assert_group_claims(TEST_GROUP_DEPLOYERS, TEST_CALLER_ALICE, TEST_HOSTNAME);

    // One membership query for exactly the requested group, one remote sign.
    assert_eq!(server.groups().calls(), 1);
    assert_eq!(
        server.groups().last_request(),
        Some((TEST_CALLER_ALICE, vec![TEST_GROUP_DEPLOYERS]))
    );
    assert_eq!(server.keys().sign_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_token_lifetime_is_ten_minutes() -> Result<(), anyhow::Error> {
    let server = spawn(
        single_key(),
        MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]),
    )
    .await?;
    let bearer = server.caller_token().sign();
    let before = chrono::Utc::now().timestamp();

    let body: TokenResponse = request_token(
        &server,
        &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
        &bearer,
    )
    .await?
    .json()
    .await?;

    let after = chrono::Utc::now().timestamp();
    let claims = decode_claims_unverified(&body.access_token);
    assert!(claims.iat >= before && claims.iat <= after);
    assert_eq!(claims.nbf, claims.iat);
    assert_eq!(claims.exp - claims.nbf, 600);

    Ok(())
}

/// The current version signs, and its public half is in the published set.
#[tokio::test]
async fn test_token_is_signed_by_current_version_and_published() -> Result<(), anyhow::Error> {
    let keys = MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
        .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1)
        .with_rsa_version(TEST_KEY_VERSION_2, true, &VAULT_KEY_V2)
        .with_current(TEST_KEY_VERSION_2);
    let server = spawn(keys, MockIdentityDirectory::member_of(&[TEST_GROUP_AUDITORS])).await?;
    let bearer = server
        .caller_token()
        .for_caller(TEST_CALLER_BOB)
        .sign();

    let body: TokenResponse = request_token(
        &server,
        &format!("?group_object_id={TEST_GROUP_AUDITORS}"),
        &bearer,
    )
    .await?
    .json()
    .await?;

    body.access_token
        .assert_signed_by(TEST_KEY_VERSION_2)
        .assert_verifies_with(&VAULT_KEY_V2)
        .assert_group_claims(TEST_GROUP_AUDITORS, TEST_CALLER_BOB, TEST_HOSTNAME);

    let jwks: Jwks = reqwest::get(format!("{}/jwks", server.url()))
        .await?
        .json()
        .await?;
    let published = jwks
        .keys
        .iter()
        .find(|k| k.kid == TEST_KEY_VERSION_2)
        .ok_or_else(|| anyhow::anyhow!("signing version missing from JWKS"))?;
    assert_eq!(published.n, VAULT_KEY_V2.n_b64());

    Ok(())
}

/// Group ids are accepted in any case and echoed in canonical form.
#[tokio::test]
async fn test_uppercase_group_id_is_canonicalized() -> Result<(), anyhow::Error> {
    let server = spawn(
        single_key(),
        MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]),
    )
    .await?;
    let bearer = server.caller_token().sign();
    let upper = TEST_GROUP_DEPLOYERS.to_string().to_uppercase();

    let response = request_token(&server, &format!("?group_object_id={upper}"), &bearer).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: TokenResponse = response.json().await?;
    assert_eq!(body.requested_group_object_id, TEST_GROUP_DEPLOYERS);
    assert_eq!(
        decode_claims_unverified(&body.access_token).sub,
        TEST_GROUP_DEPLOYERS.to_string()
    );

    Ok(())
}

// ============================================================================
// 400: request validation
// ============================================================================

#[tokio::test]
async fn test_missing_group_id_returns_400() -> Result<(), anyhow::Error> {
    let server = spawn(single_key(), MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS])).await?;
    let bearer = server.caller_token().sign();

    for query in ["", "?other=1"] {
        let response = request_token(&server, query, &bearer).await?;
        assert_error(
            response,
            StatusCode::BAD_REQUEST,
            "group_object_id query parameter is required",
        )
        .await?;
    }
    assert_no_directory_calls(&server);

    Ok(())
}

#[tokio::test]
async fn test_malformed_group_id_returns_400() -> Result<(), anyhow::Error> {
    let server = spawn(single_key(), MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS])).await?;
    let bearer = server.caller_token().sign();

    for query in [
        "?group_object_id=",
        "?group_object_id=not-a-guid",
        "?group_object_id=00000000-0000-0000-0000-0000000003e",
    ] {
        let response = request_token(&server, query, &bearer).await?;
        assert_error(
            response,
            StatusCode::BAD_REQUEST,
            "group_object_id is not a valid GUID",
        )
        .await?;
    }
    assert_no_directory_calls(&server);

    Ok(())
}

#[tokio::test]
async fn test_caller_without_valid_oid_returns_400() -> Result<(), anyhow::Error> {
    let server = spawn(single_key(), MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS])).await?;

    for bearer in [
        server.caller_token().without_oid().sign(),
        server.caller_token().with_raw_oid("alice").sign(),
    ] {
        let response = request_token(
            &server,
            &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
            &bearer,
        )
        .await?;
        assert_error(
            response,
            StatusCode::BAD_REQUEST,
            "requestor object id is not a valid GUID",
        )
        .await?;
    }
    assert_no_directory_calls(&server);

    Ok(())
}

/// The group id is validated before the caller's `oid`.
#[tokio::test]
async fn test_group_id_is_checked_before_caller_oid() -> Result<(), anyhow::Error> {
    let server = spawn(single_key(), MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS])).await?;
    let bearer = server.caller_token().without_oid().sign();

    let response = request_token(&server, "?group_object_id=bogus", &bearer).await?;

    assert_error(
        response,
        StatusCode::BAD_REQUEST,
        "group_object_id is not a valid GUID",
    )
    .await
}

// ============================================================================
// 403: not a member
// ============================================================================

#[tokio::test]
async fn test_non_member_is_forbidden() -> Result<(), anyhow::Error> {
    for groups in [
        MockIdentityDirectory::member_of(&[TEST_GROUP_AUDITORS]),
        MockIdentityDirectory::no_groups(),
        MockIdentityDirectory::null_result(),
    ] {
        let server = spawn(single_key(), groups).await?;
        let bearer = server.caller_token().sign();

        let response = request_token(
            &server,
            &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
            &bearer,
        )
        .await?;

        assert_error(
            response,
            StatusCode::FORBIDDEN,
            "requestor is not a member of the requested group",
        )
        .await?;
        assert_eq!(server.groups().calls(), 1);
        assert_eq!(server.keys().get_key_calls(), 0);
        assert_eq!(server.keys().sign_calls(), 0);
    }

    Ok(())
}

// ============================================================================
// 500: dependency failures
// ============================================================================

#[tokio::test]
async fn test_directory_failure_returns_500() -> Result<(), anyhow::Error> {
    let server = spawn(single_key(), MockIdentityDirectory::failing()).await?;
    let bearer = server.caller_token().sign();

    let response = request_token(
        &server,
        &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
        &bearer,
    )
    .await?;

    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "failed to check if requestor is a member of the requested group",
    )
    .await?;
    assert_eq!(server.keys().sign_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_signing_failure_returns_500() -> Result<(), anyhow::Error> {
    let server = spawn(
        single_key().failing_signing(),
        MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]),
    )
    .await?;
    let bearer = server.caller_token().sign();

    let response = request_token(
        &server,
        &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
        &bearer,
    )
    .await?;

    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "failed to create token",
    )
    .await?;
    assert_eq!(server.keys().sign_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_missing_signing_key_returns_500() -> Result<(), anyhow::Error> {
    let server = spawn(
        MockKeyDirectory::new(TEST_SIGNING_KEY_NAME),
        MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]),
    )
    .await?;
    let bearer = server.caller_token().sign();

    let response = request_token(
        &server,
        &format!("?group_object_id={TEST_GROUP_DEPLOYERS}"),
        &bearer,
    )
    .await?;

    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "failed to create token",
    )
    .await?;
    assert_eq!(server.keys().sign_calls(), 0);

    Ok(())
}
