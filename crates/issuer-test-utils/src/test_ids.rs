//! Fixed test IDs for deterministic tests

use uuid::Uuid;

// Callers (100-199)
pub const TEST_CALLER_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_CALLER_BOB: Uuid = Uuid::from_u128(101);

// Groups (1000-1099)
pub const TEST_GROUP_DEPLOYERS: Uuid = Uuid::from_u128(1000);
pub const TEST_GROUP_AUDITORS: Uuid = Uuid::from_u128(1001);

// Vault signing key
pub const TEST_SIGNING_KEY_NAME: &str = "oidc-signing";
pub const TEST_KEY_VERSION_1: &str = "8f4c2d1e0a9b4c7d8e6f5a4b3c2d1e0f";
pub const TEST_KEY_VERSION_2: &str = "1a2b3c4d5e6f47089a0b1c2d3e4f5a6b";

// Upstream authority
pub const TEST_UPSTREAM_KID: &str = "upstream-key-1";
pub const TEST_AUDIENCE: &str = "api://token-issuer-tests";

// Issuer public hostname
pub const TEST_HOSTNAME: &str = "auth.example.com";
