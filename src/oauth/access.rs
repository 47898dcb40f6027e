//! Bearer access tokens returned by the token endpoint.

use serde::{Deserialize, Serialize};

use super::jwt::TokenClaims;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub client_id: String,
}

impl TokenClaims for AccessTokenClaims {
    const TYPE: &'static str = "at+jwt";
}

/// Successful `/token` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
