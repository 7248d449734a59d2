//! In-memory key custody and identity directories.
//!
//! Both count their calls so tests can assert that a rejected request never
//! reached the vault or the directory.

use crate::crypto_fixtures::RsaFixture;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use token_issuer::crypto::SigningAlgorithm;
use token_issuer::errors::IssuerError;
use token_issuer::models::{KeyProperties, KeyType, KeyVaultKey};
use token_issuer::repositories::{IdentityDirectory, KeyDirectory};
use uuid::Uuid;

struct MockKeyVersion {
    key: KeyVaultKey,
    signer: Option<&'static RsaFixture>,
}

/// Vault holding versions of a single key.
///
/// `get_key(name, None)` returns the current version: the last enabled
/// version added, unless overridden with [`with_current`](Self::with_current).
pub struct MockKeyDirectory {
    name: String,
    versions: Vec<MockKeyVersion>,
    current: Option<String>,
    fail_listing: bool,
    failing_fetch: Option<String>,
    fail_signing: bool,
    list_calls: AtomicUsize,
    get_key_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl MockKeyDirectory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: Vec::new(),
            current: None,
            fail_listing: false,
            failing_fetch: None,
            fail_signing: false,
            list_calls: AtomicUsize::new(0),
            get_key_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    fn push(mut self, key: KeyVaultKey, signer: Option<&'static RsaFixture>) -> Self {
        if key.enabled == Some(true) {
            self.current = key.version.clone();
        }
        self.versions.push(MockKeyVersion { key, signer });
        self
    }

    /// RSA-HSM version backed by `fixture`.
    pub fn with_rsa_version(self, version: &str, enabled: bool, fixture: &'static RsaFixture) -> Self {
        let mut key = fixture.vault_key(&self.name, version);
        key.enabled = Some(enabled);
        self.push(key, Some(fixture))
    }

    /// RSA version whose listing omits the `enabled` attribute.
    pub fn with_unattributed_version(self, version: &str, fixture: &'static RsaFixture) -> Self {
        let mut key = fixture.vault_key(&self.name, version);
        key.enabled = None;
        self.push(key, Some(fixture))
    }

    /// Enabled EC version. Has no RSA components and cannot sign.
    pub fn with_ec_version(self, version: &str) -> Self {
        let key = KeyVaultKey {
            name: self.name.clone(),
            version: Some(version.to_string()),
            key_type: KeyType::Other("EC-HSM".to_string()),
            n: Vec::new(),
            e: Vec::new(),
            enabled: Some(true),
        };
        self.push(key, None)
    }

    /// Enabled RSA version whose bundle carries no `n` or `e`.
    pub fn with_componentless_rsa_version(self, version: &str) -> Self {
        let key = KeyVaultKey {
            name: self.name.clone(),
            version: Some(version.to_string()),
            key_type: KeyType::Rsa,
            n: Vec::new(),
            e: Vec::new(),
            enabled: Some(true),
        };
        self.push(key, None)
    }

    pub fn with_current(mut self, version: &str) -> Self {
        self.current = Some(version.to_string());
        self
    }

    /// Listing yields an error after the configured versions.
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Fetching `version` fails.
    pub fn failing_fetch(mut self, version: &str) -> Self {
        self.failing_fetch = Some(version.to_string());
        self
    }

    pub fn failing_signing(mut self) -> Self {
        self.fail_signing = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_key_calls(&self) -> usize {
        self.get_key_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    fn find(&self, version: &str) -> Option<&MockKeyVersion> {
        self.versions
            .iter()
            .find(|v| v.key.version.as_deref() == Some(version))
    }
}

#[async_trait]
impl KeyDirectory for MockKeyDirectory {
    fn list_key_versions<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxStream<'a, Result<KeyProperties, IssuerError>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if name != self.name {
            return stream::once(async move {
                Err(IssuerError::Dependency(format!("key '{name}' not found")))
            })
            .boxed();
        }

        let mut items: Vec<Result<KeyProperties, IssuerError>> = self
            .versions
            .iter()
            .map(|v| {
                Ok(KeyProperties {
                    name: self.name.clone(),
                    version: v.key.version.clone(),
                    enabled: v.key.enabled,
                })
            })
            .collect();
        if self.fail_listing {
            items.push(Err(IssuerError::Dependency("listing failed".to_string())));
        }
        stream::iter(items).boxed()
    }

    async fn get_key(&self, name: &str, version: Option<&str>) -> Result<KeyVaultKey, IssuerError> {
        self.get_key_calls.fetch_add(1, Ordering::SeqCst);
        if name != self.name {
            return Err(IssuerError::Dependency(format!("key '{name}' not found")));
        }

        let version = match version {
            Some(v) => v.to_string(),
            None => self
                .current
                .clone()
                .ok_or_else(|| IssuerError::Dependency("no current version".to_string()))?,
        };
        if self.failing_fetch.as_deref() == Some(version.as_str()) {
            return Err(IssuerError::Dependency(format!("fetch of {version} failed")));
        }

        self.find(&version)
            .map(|v| v.key.clone())
            .ok_or_else(|| IssuerError::Dependency(format!("version {version} not found")))
    }

    async fn sign(
        &self,
        name: &str,
        version: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, IssuerError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_signing {
            return Err(IssuerError::Dependency("sign operation failed".to_string()));
        }
        if name != self.name || algorithm != SigningAlgorithm::Rs256 || digest.len() != 32 {
            return Err(IssuerError::Dependency("bad sign request".to_string()));
        }

        self.find(version)
            .and_then(|v| v.signer)
            .map(|fixture| fixture.sign_digest(digest))
            .ok_or_else(|| IssuerError::Dependency(format!("version {version} cannot sign")))
    }
}

/// Directory that answers every membership query the same way.
pub struct MockIdentityDirectory {
    response: Result<Option<Vec<String>>, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(Uuid, Vec<Uuid>)>>,
}

impl MockIdentityDirectory {
    fn with_response(response: Result<Option<Vec<String>>, String>) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Caller belongs to exactly these groups.
    pub fn member_of(groups: &[Uuid]) -> Self {
        Self::with_response(Ok(Some(groups.iter().map(Uuid::to_string).collect())))
    }

    /// Empty result list.
    pub fn no_groups() -> Self {
        Self::with_response(Ok(Some(Vec::new())))
    }

    /// `{"value": null}`.
    pub fn null_result() -> Self {
        Self::with_response(Ok(None))
    }

    pub fn failing() -> Self {
        Self::with_response(Err("directory unavailable".to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(user_id, group_ids)` of the most recent query.
    pub fn last_request(&self) -> Option<(Uuid, Vec<Uuid>)> {
        self.last_request.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl IdentityDirectory for MockIdentityDirectory {
    async fn check_member_groups(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Option<Vec<String>>, IssuerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("lock poisoned") = Some((user_id, group_ids.to_vec()));

        // Only requested groups come back, like the real directory.
        match &self.response {
            Ok(Some(groups)) => Ok(Some(
                groups
                    .iter()
                    .filter(|g| group_ids.iter().any(|id| id.to_string() == **g))
                    .cloned()
                    .collect(),
            )),
            Ok(None) => Ok(None),
            Err(message) => Err(IssuerError::Dependency(message.clone())),
        }
    }
}
