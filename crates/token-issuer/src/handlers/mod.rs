//! HTTP request handlers.

pub mod health;
pub mod jwks_handler;
pub mod metadata_handler;
pub mod metrics;
pub mod token_handler;

pub use health::health_check;
pub use jwks_handler::handle_get_jwks;
pub use metadata_handler::handle_get_metadata;
pub use metrics::metrics_handler;
pub use token_handler::handle_get_token;
