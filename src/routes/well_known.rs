use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use super::AppState;

/// GET /.well-known/oauth-protected-resource (RFC 9728)
pub async fn protected_resource(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resource": state.codec.audience(),
        "authorization_servers": [state.codec.issuer()],
        "bearer_methods_supported": ["header"],
    }))
}

/// GET /.well-known/oauth-authorization-server (RFC 8414)
pub async fn authorization_server(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.codec.issuer(),
        "authorization_endpoint": state.endpoint("/authorize"),
        "token_endpoint": state.endpoint("/token"),
        "registration_endpoint": state.endpoint("/register"),
        "introspection_endpoint": state.endpoint("/introspect"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["none"],
    }))
}
