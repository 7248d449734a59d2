//! OIDC token issuer.
//!
//! Issues short-lived group tokens signed by a Key Vault key and publishes
//! the discovery document and JWKS relying parties need to verify them.
//!
//! # Modules
//!
//! - `auth` - validation of callers' bearer tokens
//! - `config` - environment configuration
//! - `crypto` - JWT assembly and the remote signing adapter
//! - `errors` - `IssuerError` and its HTTP mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - bearer auth and request metrics
//! - `models` - wire and domain types
//! - `observability` - metrics and log correlation
//! - `repositories` - Key Vault and Microsoft Graph clients
//! - `routes` - router and `AppState`
//! - `services` - JWKS, metadata and token issuance logic

pub mod auth;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
