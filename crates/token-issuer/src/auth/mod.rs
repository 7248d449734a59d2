//! Inbound bearer authentication.
//!
//! Callers present tokens minted by the upstream authority (`JWT_ISSUER`).
//! Keys are discovered through the authority's OIDC metadata.
//!
//! # Components
//!
//! - `jwks` - discovery plus a TTL cache of the authority's signing keys
//! - `jwt` - RS256 validation of caller tokens
//! - `claims` - the validated caller claims

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::CallerClaims;
pub use jwks::JwksClient;
pub use jwt::JwtValidator;
