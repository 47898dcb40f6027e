use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::oauth::error::{no_store, CLIENT_ID_MISMATCH, INVALID_CODE, REDIRECT_URI_MISMATCH};
use crate::oauth::jwt::{unix_now, CLOCK_SKEW_SECS};
use crate::oauth::{
    AccessTokenClaims, AuthorizationCodeClaims, OAuthError, TokenRequest, TokenResponse,
};

use super::{parse_body, AppState};

/// POST /token — exchange an authorization code for an access token
pub async fn token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match exchange(&state, &headers, &body) {
        Ok(response) => no_store(Json(response).into_response()),
        Err(e) => e.into_response(),
    }
}

/// Each step short-circuits with its own error; nothing is retried.
fn exchange(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<TokenResponse, OAuthError> {
    let params = parse_body(headers, body).map_err(|e| {
        tracing::warn!(error = %e, "Unparseable token request body");
        OAuthError::ServerError
    })?;

    let request = TokenRequest::from_params(&params).map_err(|e| {
        tracing::warn!(error = %e, "Rejected token request");
        OAuthError::invalid_request(e.to_string())
    })?;

    let grant = state
        .codec
        .verify::<AuthorizationCodeClaims>(&request.code)
        .map_err(|reason| {
            tracing::warn!(client_id = %request.client_id, %reason, "Authorization code failed verification");
            OAuthError::InvalidGrant(INVALID_CODE)
        })?;

    if grant.claims.client_id != request.client_id {
        tracing::warn!(client_id = %request.client_id, "Code was issued to a different client");
        return Err(OAuthError::InvalidGrant(CLIENT_ID_MISMATCH));
    }
    if grant.claims.redirect_uri != request.redirect_uri {
        tracing::warn!(client_id = %request.client_id, "Code was issued for a different redirect URI");
        return Err(OAuthError::InvalidGrant(REDIRECT_URI_MISMATCH));
    }

    state
        .policy
        .check_redemption(&grant.claims, request.proof.as_ref())
        .inspect_err(|e| {
            tracing::warn!(client_id = %request.client_id, error = %e, "Proof of possession failed");
        })?;

    if let Some(redeemed) = &state.redeemed {
        let now = unix_now().map_err(|e| {
            tracing::error!(error = %e, "System clock unavailable");
            OAuthError::ServerError
        })?;
        let forget_after = grant.exp.saturating_add(CLOCK_SKEW_SECS);
        if !redeemed.redeem(&grant.claims.jti, forget_after, now) {
            tracing::warn!(client_id = %request.client_id, "Authorization code replayed");
            return Err(OAuthError::InvalidGrant(INVALID_CODE));
        }
    }

    let claims = AccessTokenClaims {
        sub: grant.claims.sub,
        client_id: request.client_id,
    };
    let access_token = state
        .codec
        .sign(&claims, state.access_token_ttl)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            OAuthError::ServerError
        })?;

    tracing::info!(client_id = %claims.client_id, "Issued access token");
    Ok(TokenResponse::bearer(
        access_token,
        state.access_token_ttl.as_secs(),
    ))
}
