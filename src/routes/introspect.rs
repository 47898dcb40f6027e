use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::oauth::error::no_store;
use crate::oauth::{AccessTokenClaims, OAuthError};

use super::{parse_body, AppState};

/// POST /introspect — report whether an access token is active (RFC 7662)
///
/// Anything that does not verify as an access token is simply inactive.
pub async fn introspect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = match parse_body(&headers, &body) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable introspection body");
            return OAuthError::ServerError.into_response();
        }
    };
    let Some(Value::String(token)) = params.get("token") else {
        return OAuthError::invalid_request("token: Required").into_response();
    };

    let body = match state.codec.verify::<AccessTokenClaims>(token) {
        Ok(signed) => serde_json::json!({
            "active": true,
            "sub": signed.claims.sub,
            "client_id": signed.claims.client_id,
            "aud": signed.aud,
            "iss": signed.iss,
            "iat": signed.iat,
            "exp": signed.exp,
            "token_type": "Bearer",
        }),
        Err(reason) => {
            tracing::debug!(%reason, "Introspected token is inactive");
            serde_json::json!({ "active": false })
        }
    };
    no_store(Json(body).into_response())
}
