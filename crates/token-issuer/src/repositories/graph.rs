//! Microsoft Graph group membership client.

use crate::errors::IssuerError;
use async_trait::async_trait;
use common::secret::ExposeSecret;
use common::token_credential::{TokenCredential, GRAPH_RESOURCE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Membership queries against the identity directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Return the subset of `group_ids` that `user_id` belongs to
    /// (transitively). `None` means the directory returned no list at all.
    async fn check_member_groups(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Option<Vec<String>>, IssuerError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckMemberGroupsRequest<'a> {
    group_ids: &'a [Uuid],
}

#[derive(Deserialize)]
struct CheckMemberGroupsResponse {
    #[serde(default)]
    value: Option<Vec<String>>,
}

pub struct GraphClient {
    http_client: Client,
    base_url: String,
    credential: Arc<dyn TokenCredential>,
}

impl GraphClient {
    /// `base_url` is the Graph root, e.g. `https://graph.microsoft.com`.
    pub fn new(http_client: Client, base_url: &str, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }
}

#[async_trait]
impl IdentityDirectory for GraphClient {
    #[instrument(skip_all, name = "graph.check_member_groups", fields(groups = group_ids.len()))]
    async fn check_member_groups(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Option<Vec<String>>, IssuerError> {
        let token = self.credential.get_token(GRAPH_RESOURCE).await.map_err(|e| {
            error!(target: "issuer.repo.graph", error = %e, "Failed to acquire graph token");
            IssuerError::Dependency(format!("graph token acquisition failed: {e}"))
        })?;

        let url = format!(
            "{}/v1.0/users/{}/checkMemberGroups",
            self.base_url, user_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.token.expose_secret())
            .json(&CheckMemberGroupsRequest { group_ids })
            .send()
            .await
            .map_err(|e| {
                error!(target: "issuer.repo.graph", error = %e, "Graph request failed");
                IssuerError::Dependency(format!("checkMemberGroups: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "issuer.repo.graph", status = %status, "Graph returned error status");
            return Err(IssuerError::Dependency(format!(
                "checkMemberGroups: graph returned {status}"
            )));
        }

        let body: CheckMemberGroupsResponse = response.json().await.map_err(|e| {
            error!(target: "issuer.repo.graph", error = %e, "Failed to parse graph response");
            IssuerError::Dependency(format!("checkMemberGroups: invalid response body: {e}"))
        })?;

        Ok(body.value)
    }
}
