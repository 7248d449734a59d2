//! Token issuer error type.
//!
//! Every handler returns `Result<_, IssuerError>`. The `IntoResponse` impl
//! renders `{"error": "<message>"}`. Server-side causes (remote Key Vault or
//! Graph failures, local serialization failures) are logged and never echoed
//! to the caller.

use crate::crypto::SigningError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message used when a 500-class error reaches the boundary without context.
const GENERIC_SERVER_ERROR: &str = "an internal error occurred";

/// Token issuer error type.
///
/// - BadRequest: 400
/// - InvalidToken: 401 (adds `WWW-Authenticate`)
/// - Forbidden: 403
/// - Dependency, Internal: 500
/// - Context: status of the wrapped error, with a caller-facing message
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Key Vault, Graph or managed identity call failed or returned unusable data.
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Local construction or serialization failure.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{message}: {source}")]
    Context {
        message: &'static str,
        #[source]
        source: Box<IssuerError>,
    },
}

impl IssuerError {
    /// HTTP status code for this error (also used for metrics labels).
    pub fn status_code(&self) -> u16 {
        match self {
            IssuerError::BadRequest(_) => 400,
            IssuerError::InvalidToken(_) => 401,
            IssuerError::Forbidden(_) => 403,
            IssuerError::Dependency(_) | IssuerError::Internal(_) => 500,
            IssuerError::Context { source, .. } => source.status_code(),
        }
    }

    /// Attach the message returned to the caller if this error is a server fault.
    ///
    /// Client errors keep their own message.
    pub fn context(self, message: &'static str) -> Self {
        match self {
            IssuerError::Dependency(_) | IssuerError::Internal(_) => IssuerError::Context {
                message,
                source: Box::new(self),
            },
            other => other,
        }
    }

    /// The innermost error, skipping any `Context` wrappers.
    pub fn root(&self) -> &IssuerError {
        match self {
            IssuerError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<SigningError> for IssuerError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Remote(cause) | SigningError::InvalidKey(cause) => {
                IssuerError::Dependency(cause)
            }
            other => IssuerError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for IssuerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self {
            IssuerError::BadRequest(reason)
            | IssuerError::InvalidToken(reason)
            | IssuerError::Forbidden(reason) => reason.clone(),
            IssuerError::Dependency(cause) | IssuerError::Internal(cause) => {
                tracing::error!(target: "issuer.errors", error = %cause, "Request failed");
                GENERIC_SERVER_ERROR.to_string()
            }
            IssuerError::Context { message, source } => {
                tracing::error!(target: "issuer.errors", error = %source, "{}", message);
                (*message).to_string()
            }
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"token-issuer\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
