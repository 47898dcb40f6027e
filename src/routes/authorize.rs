use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::oauth::codes::random_id;
use crate::oauth::validate::params_from_pairs;
use crate::oauth::{AuthorizationCodeClaims, AuthorizationRequest, OAuthError};

use super::AppState;

/// GET /authorize — parameters in the query string
pub async fn authorize_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query.as_deref().unwrap_or("")) {
        Ok(pairs) => authorize(&state, &headers, pairs).await,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable authorization query");
            OAuthError::invalid_request("Malformed query string").into_response()
        }
    }
}

/// POST /authorize — parameters as a form body, the query string, or both.
/// A key present in the body shadows the same key in the query.
pub async fn authorize_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let mut pairs = match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body) {
        Ok(pairs) => pairs,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable authorization form");
            return OAuthError::invalid_request("Malformed form body").into_response();
        }
    };
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query.as_deref().unwrap_or("")) {
        Ok(query_pairs) => pairs.extend(query_pairs),
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable authorization query");
            return OAuthError::invalid_request("Malformed query string").into_response();
        }
    }
    authorize(&state, &headers, pairs).await
}

/// Validate, require a logged-in user, then redirect back with a signed code.
async fn authorize(state: &AppState, headers: &HeaderMap, pairs: Vec<(String, String)>) -> Response {
    let params = params_from_pairs(pairs.iter().cloned());
    let request = match AuthorizationRequest::from_params(&params) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected authorization request");
            return OAuthError::invalid_request(e.to_string()).into_response();
        }
    };
    if let Err(e) = state.policy.check_authorization(&request) {
        tracing::warn!(client_id = %request.client_id, error = %e, "Authorization request violates proof policy");
        return e.into_response();
    }

    let Some(subject) = state.session.authenticated_subject(headers).await else {
        tracing::debug!(client_id = %request.client_id, "No session, redirecting to login");
        return redirect(&login_redirect(state, &pairs));
    };

    if let Some(resource) = &request.resource {
        if resource != state.codec.audience() {
            tracing::debug!(%resource, "Ignoring requested resource, tokens use the configured audience");
        }
    }

    let claims = AuthorizationCodeClaims {
        sub: subject,
        client_id: request.client_id.clone(),
        redirect_uri: request.redirect_uri.clone(),
        code_challenge: request.code_challenge.clone(),
        client_secret: request.client_secret.clone(),
        jti: random_id(),
    };
    let code = match state.codec.sign(&claims, state.code_ttl) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign authorization code");
            return OAuthError::ServerError.into_response();
        }
    };

    let Ok(mut location) = url::Url::parse(&request.redirect_uri) else {
        // validated above
        return OAuthError::ServerError.into_response();
    };
    {
        let mut query = location.query_pairs_mut();
        query.append_pair("code", &code);
        query.append_pair("state", &request.state);
    }

    tracing::info!(
        client_id = %request.client_id,
        pkce = request.code_challenge.is_some(),
        client_secret = request.client_secret.is_some(),
        "Issued authorization code"
    );
    redirect(location.as_str())
}

/// Login page URL carrying this authorization request as the resume target.
fn login_redirect(state: &AppState, pairs: &[(String, String)]) -> String {
    let resume = match serde_urlencoded::to_string(pairs) {
        Ok(query) if !query.is_empty() => format!("{}?{}", state.endpoint("/authorize"), query),
        _ => state.endpoint("/authorize"),
    };
    let separator = if state.login_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        state.login_url,
        separator,
        state.callback_param,
        urlencoding::encode(&resume)
    )
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
