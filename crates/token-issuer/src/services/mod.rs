//! Business logic between the HTTP handlers and the remote directories.

pub mod jwks_service;
pub mod metadata_service;
pub mod token_service;
