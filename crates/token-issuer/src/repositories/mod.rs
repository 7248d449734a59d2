//! Clients for the remote directories the issuer depends on.

pub mod graph;
pub mod key_vault;

pub use graph::{GraphClient, IdentityDirectory};
pub use key_vault::{KeyDirectory, KeyVaultClient};
