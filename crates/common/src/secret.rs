//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. The issuer uses these for bearer
//! tokens obtained from managed identity, the App Service identity header and
//! any other value that must never reach a log line.
//!
//! `SecretString` implements `Debug` with redaction, so structs that derive
//! `Debug` stay safe to log. The value is only reachable through
//! `expose_secret()`.
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct IdentityEndpoint {
//!     url: String,
//!     header: SecretString,
//! }
//!
//! let endpoint = IdentityEndpoint {
//!     url: "http://localhost:8081/msi/token".to_string(),
//!     header: SecretString::from("x-identity-header-value"),
//! };
//!
//! assert!(!format!("{endpoint:?}").contains("x-identity-header-value"));
//! assert_eq!(endpoint.header.expose_secret(), "x-identity-header-value");
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretString};
