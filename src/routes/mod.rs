pub mod authorize;
pub mod introspect;
pub mod register;
pub mod token;
pub mod well_known;

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::oauth::validate::{params_from_form, params_from_json};
use crate::oauth::{CodecConfig, ExpiresIn, OAuthError, Params, ProofPolicy, RedeemedCodes, TokenCodec};
use crate::session::{SessionProvider, TrustedHeaderSession};

/// Everything a request needs. Built once at startup and never mutated,
/// apart from the redeemed-code ledger.
pub struct AppState {
    pub codec: TokenCodec,
    pub policy: ProofPolicy,
    pub session: Arc<dyn SessionProvider>,
    pub redeemed: Option<RedeemedCodes>,
    pub public_url: String,
    pub login_url: String,
    pub callback_param: String,
    pub code_ttl: ExpiresIn,
    pub access_token_ttl: ExpiresIn,
}

impl AppState {
    /// Build state from validated config, with an explicit session provider.
    pub fn new(config: &Config, session: Arc<dyn SessionProvider>) -> Result<Self, String> {
        let server = &config.server;
        let codec = TokenCodec::new(CodecConfig {
            secret: server.secret_bytes()?,
            issuer: server.issuer().to_string(),
            audience: server.resource().to_string(),
        });

        Ok(Self {
            codec,
            policy: config.policy.proof_policy(),
            session,
            redeemed: server.single_use_codes.then(RedeemedCodes::new),
            public_url: server.public_url.clone(),
            login_url: config.session.login_url.clone(),
            callback_param: config.session.callback_param.clone(),
            code_ttl: server.code_ttl()?,
            access_token_ttl: server.access_token_ttl()?,
        })
    }

    /// Build state that reads the end user from the configured trusted header.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let header = axum::http::HeaderName::try_from(config.session.user_header.as_str())
            .map_err(|e| format!("session.user_header: {e}"))?;
        Self::new(config, Arc::new(TrustedHeaderSession::new(header)))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Discovery endpoints
        .route(
            "/.well-known/oauth-protected-resource",
            get(well_known::protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(well_known::authorization_server),
        )
        // Authorization endpoint
        .route(
            "/authorize",
            get(authorize::authorize_get).post(authorize::authorize_post),
        )
        // Token endpoints
        .route("/token", post(token::token))
        .route("/introspect", post(introspect::introspect))
        .route("/register", post(register::register))
        .layer(CatchPanicLayer::custom(|_panic: Box<dyn std::any::Any + Send + 'static>| {
            tracing::error!("Request handler panicked");
            OAuthError::ServerError.into_response()
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Read a request body as JSON or form data according to its content type.
pub(crate) fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Params, String> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"));

    if is_json {
        params_from_json(body).map_err(|e| format!("invalid JSON body: {e}"))
    } else {
        params_from_form(body).map_err(|e| format!("invalid form body: {e}"))
    }
}
