//! # Issuer Test Utilities
//!
//! Shared test utilities for the token issuer.
//!
//! This crate provides:
//! - Deterministic RSA fixtures (vault key versions and an upstream authority)
//! - In-memory key and identity directories with call counters
//! - Caller token builders (CallerTokenBuilder)
//! - Server test harness (TestIssuerServer for E2E tests)
//! - Fixed test IDs (UUIDs, constants)
//! - Custom assertions (IssuedTokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use issuer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let keys = Arc::new(MockKeyDirectory::new(TEST_SIGNING_KEY_NAME)
//!         .with_rsa_version(TEST_KEY_VERSION_1, true, &VAULT_KEY_V1));
//!     let groups = Arc::new(MockIdentityDirectory::member_of(&[TEST_GROUP_DEPLOYERS]));
//!     let server = TestIssuerServer::spawn(keys, groups).await?;
//!
//!     let token: String = /* GET /token with server.caller_token().sign() */;
//!     token.assert_valid_jwt()
//!          .assert_signed_by(TEST_KEY_VERSION_1)
//!          .assert_verifies_with(&VAULT_KEY_V1);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod mocks;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use mocks::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
