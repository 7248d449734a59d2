use crate::auth::CallerClaims;
use crate::errors::IssuerError;
use crate::models::{TokenQuery, TokenResponse};
use crate::observability::metrics::{record_error, record_token_issuance};
use crate::observability::{hash_for_correlation, ErrorCategory};
use crate::routes::AppState;
use crate::services::token_service;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Validate the requested group id. Checked before anything touches the network.
fn parse_group_id(query: Option<&TokenQuery>) -> Result<Uuid, IssuerError> {
    let raw = query
        .and_then(|q| q.group_object_id.as_deref())
        .ok_or_else(|| {
            IssuerError::BadRequest("group_object_id query parameter is required".to_string())
        })?;

    raw.parse()
        .map_err(|_| IssuerError::BadRequest("group_object_id is not a valid GUID".to_string()))
}

fn parse_caller_id(claims: Option<&CallerClaims>) -> Result<Uuid, IssuerError> {
    claims.and_then(CallerClaims::object_id).ok_or_else(|| {
        IssuerError::BadRequest("requestor object id is not a valid GUID".to_string())
    })
}

async fn issue(
    state: &AppState,
    claims: Option<&CallerClaims>,
    query: Option<&TokenQuery>,
) -> Result<TokenResponse, IssuerError> {
    let group = parse_group_id(query)?;
    let caller = parse_caller_id(claims)?;

    tracing::debug!(
        target: "issuer.token.handler",
        caller = %hash_for_correlation(&caller.to_string()),
        group = %hash_for_correlation(&group.to_string()),
        "Token requested"
    );

    let member = token_service::is_member(state.identity_directory.as_ref(), caller, group)
        .await
        .map_err(|e| e.context("failed to check if requestor is a member of the requested group"))?;

    if !member {
        return Err(IssuerError::Forbidden(
            "requestor is not a member of the requested group".to_string(),
        ));
    }

    let access_token = token_service::issue_group_token(
        state.key_directory.clone(),
        &state.config.signing_key_name,
        &state.config.public_hostname,
        caller,
        group,
    )
    .await
    .map_err(|e| e.context("failed to create token"))?;

    Ok(TokenResponse {
        access_token,
        requestor_object_id: caller,
        requested_group_object_id: group,
    })
}

/// GET /token?group_object_id=<uuid>
///
/// Issues a token for the requested group if the authenticated caller is a
/// member of it.
///
/// # Response
///
/// - 200 `{access_token, requestor_object_id, requested_group_object_id}`
/// - 400 missing/malformed group id or caller `oid`
/// - 403 caller is not a member
/// - 500 directory or signing failure
#[instrument(name = "issuer.token.handler", skip_all, fields(status))]
pub async fn handle_get_token(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<CallerClaims>>,
    query: Option<Query<TokenQuery>>,
) -> Result<Json<TokenResponse>, IssuerError> {
    let start = Instant::now();

    let result = issue(
        &state,
        claims.as_ref().map(|Extension(c)| c),
        query.as_ref().map(|Query(q)| q),
    )
    .await;

    let span = tracing::Span::current();
    match result {
        Ok(response) => {
            span.record("status", "success");
            record_token_issuance("success", start.elapsed());
            tracing::info!(target: "issuer.token.handler", "Group token issued");
            Ok(Json(response))
        }
        Err(e) => {
            span.record("status", "error");
            record_token_issuance("error", start.elapsed());
            record_error("token", ErrorCategory::from(&e).as_str(), e.status_code());
            Err(e)
        }
    }
}
