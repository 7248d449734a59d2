use crate::crypto::remote_signer::{RemoteRsaKey, RemoteSignatureProvider};
use crate::crypto::{sign_jwt, SigningAlgorithm};
use crate::errors::IssuerError;
use crate::models::IssuedClaims;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_membership_check;
use crate::repositories::{IdentityDirectory, KeyDirectory};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Validity window of an issued group token.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(600);

/// Audience expected by workload identity federation.
pub const AUDIENCE: &str = "api://AzureADTokenExchange";

/// Whether `caller` is a (transitive) member of `group`.
///
/// A directory response with no result list counts as "not a member".
#[instrument(skip_all, name = "issuer.token.membership")]
pub async fn is_member(
    directory: &dyn IdentityDirectory,
    caller: Uuid,
    group: Uuid,
) -> Result<bool, IssuerError> {
    let groups = match directory.check_member_groups(caller, &[group]).await {
        Ok(groups) => groups,
        Err(e) => {
            record_membership_check("error");
            return Err(e);
        }
    };

    let member = match groups {
        Some(groups) => groups
            .iter()
            .filter_map(|id| id.parse::<Uuid>().ok())
            .any(|id| id == group),
        None => {
            warn!(
                target: "issuer.token.membership",
                caller = %hash_for_correlation(&caller.to_string()),
                group = %hash_for_correlation(&group.to_string()),
                "Directory returned no membership list, treating as not a member"
            );
            false
        }
    };

    record_membership_check(if member { "member" } else { "not_member" });
    Ok(member)
}

/// Claims for a token asserting `caller` belongs to `group`, valid from `now`.
pub fn group_token_claims(hostname: &str, caller: Uuid, group: Uuid, now: i64) -> IssuedClaims {
    let lifetime = i64::try_from(TOKEN_LIFETIME.as_secs()).unwrap_or(i64::MAX);
    IssuedClaims {
        sub: group.to_string(),
        iat: now,
        nbf: now,
        exp: now.saturating_add(lifetime),
        iss: format!("https://{hostname}"),
        aud: AUDIENCE.to_string(),
        requestor_oid: caller.to_string(),
    }
}

/// Sign a group token with the current version of `key_name`.
///
/// Fetches the key's public half, then signs remotely. The token's `kid` is
/// the key version, which is also its `kid` in the published JWKS.
#[instrument(skip_all, name = "issuer.token.issue")]
pub async fn issue_group_token(
    directory: Arc<dyn KeyDirectory>,
    key_name: &str,
    hostname: &str,
    caller: Uuid,
    group: Uuid,
) -> Result<String, IssuerError> {
    let key = directory.get_key(key_name, None).await?;
    let key = RemoteRsaKey::from_key(&key)?;
    debug!(target: "issuer.token.issue", kid = %key.version(), "Signing with current key version");

    let signer = RemoteSignatureProvider::new(key, SigningAlgorithm::Rs256, directory);
    let claims = group_token_claims(hostname, caller, group, Utc::now().timestamp());

    Ok(sign_jwt(&claims, &signer).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const CALLER: &str = "0b8f3c7e-6c51-4a8e-9d4e-1d2c3b4a5f60";
    const GROUP: &str = "7d2e9a10-3b4c-4d5e-8f60-718293a4b5c6";

    struct FixedDirectory(Result<Option<Vec<String>>, ()>);

    #[async_trait]
    impl IdentityDirectory for FixedDirectory {
        async fn check_member_groups(
            &self,
            _user_id: Uuid,
            group_ids: &[Uuid],
        ) -> Result<Option<Vec<String>>, IssuerError> {
            assert_eq!(group_ids.len(), 1);
            self.0
                .clone()
                .map_err(|()| IssuerError::Dependency("graph unavailable".into()))
        }
    }

    async fn check(response: Result<Option<Vec<String>>, ()>) -> Result<bool, IssuerError> {
        is_member(
            &FixedDirectory(response),
            CALLER.parse().unwrap(),
            GROUP.parse().unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn test_member_when_group_is_returned() {
        assert!(check(Ok(Some(vec![GROUP.to_string()]))).await.unwrap());
    }

    #[tokio::test]
    async fn test_group_ids_compare_as_uuids() {
        assert!(check(Ok(Some(vec![GROUP.to_uppercase()]))).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_member_cases() {
        assert!(!check(Ok(Some(vec![]))).await.unwrap());
        assert!(!check(Ok(None)).await.unwrap());
        assert!(!check(Ok(Some(vec![CALLER.to_string(), "not-a-guid".into()])))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        assert!(matches!(check(Err(())).await, Err(IssuerError::Dependency(_))));
    }

    #[test]
    fn test_group_token_claims() {
        let caller: Uuid = CALLER.parse().unwrap();
        let group: Uuid = GROUP.parse().unwrap();
        let claims = group_token_claims("auth.example.com", caller, group, 1_700_000_000);

        assert_eq!(claims.sub, GROUP);
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.nbf, 1_700_000_000);
        assert_eq!(claims.exp - claims.nbf, 600);
        assert_eq!(claims.iss, "https://auth.example.com");
        assert_eq!(claims.aud, "api://AzureADTokenExchange");
        assert_eq!(claims.requestor_oid, CALLER);
    }
}
