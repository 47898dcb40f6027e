use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::oauth::OAuthError;

/// Client metadata (RFC 7591). Nothing is persisted.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
}

/// POST /register — hand out a fresh client_id
///
/// Registration is stateless: the id is random and never looked up again.
/// Each authorization code carries its own client and redirect binding.
pub async fn register(payload: Result<Json<RegisterRequest>, JsonRejection>) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unparseable registration request");
            return OAuthError::InvalidClientMetadata(rejection.body_text()).into_response();
        }
    };

    if req.redirect_uris.is_empty() {
        return OAuthError::InvalidClientMetadata("redirect_uris is required".to_string())
            .into_response();
    }
    if let Some(bad) = req
        .redirect_uris
        .iter()
        .find(|uri| url::Url::parse(uri).is_err())
    {
        return OAuthError::InvalidClientMetadata(format!("redirect_uri '{bad}' is not a valid URL"))
            .into_response();
    }

    let auth_method = req
        .token_endpoint_auth_method
        .unwrap_or_else(|| "none".to_string());
    if !matches!(auth_method.as_str(), "none" | "client_secret_post") {
        return OAuthError::InvalidClientMetadata(format!(
            "token_endpoint_auth_method '{auth_method}' is not supported"
        ))
        .into_response();
    }

    let client_id = format!("client_{}", crate::oauth::codes::random_id());
    tracing::info!(%client_id, "Registered OAuth client");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "client_id": client_id,
            "client_name": req.client_name,
            "redirect_uris": req.redirect_uris,
            "grant_types": ["authorization_code"],
            "response_types": ["code"],
            "token_endpoint_auth_method": auth_method,
        })),
    )
        .into_response()
}
