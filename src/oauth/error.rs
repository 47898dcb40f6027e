//! Caller-visible OAuth error responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Generic description for every failure to verify an authorization code.
pub const INVALID_CODE: &str = "Invalid or expired authorization code";
pub const CLIENT_ID_MISMATCH: &str = "Client ID does not match";
pub const REDIRECT_URI_MISMATCH: &str = "Redirect URI does not match";
pub const CLIENT_SECRET_MISMATCH: &str = "Client secret does not match";
pub const PKCE_FAILED: &str = "PKCE verification failed";
pub const PROOF_REQUIRED: &str = "Either client_secret or code_verifier is required";
pub const PROOF_NOT_BOUND: &str = "Authorization code is not bound to a proof of possession";
pub const SERVER_ERROR_DESCRIPTION: &str = "An internal server error occurred";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    /// Malformed or missing parameters.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// The code failed verification or its bindings did not match.
    #[error("invalid_grant: {0}")]
    InvalidGrant(&'static str),

    /// Dynamic client registration metadata was rejected.
    #[error("invalid_client_metadata: {0}")]
    InvalidClientMetadata(String),

    /// Anything unexpected. The detail stays in the logs.
    #[error("server_error")]
    ServerError,
}

impl OAuthError {
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::InvalidRequest(description.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::ServerError => "server_error",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(d) | Self::InvalidClientMetadata(d) => d,
            Self::InvalidGrant(d) => d,
            Self::ServerError => SERVER_ERROR_DESCRIPTION,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.code(),
            "error_description": self.description(),
        }));
        no_store((self.status(), body).into_response())
    }
}

/// Add the cache headers RFC 6749 §5.1 requires on token responses.
pub fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
