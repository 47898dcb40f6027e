use serde::Deserialize;
use std::path::Path;

use crate::oauth::{ExpiresIn, ProofMechanism, ProofPolicy};

/// Top-level configuration parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Server-level configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub public_url: String,
    /// Base64 key for HMAC-signing authorization codes and access tokens.
    pub signing_secret: String,
    /// `iss` of every token. Defaults to `public_url`.
    #[serde(default)]
    pub issuer: Option<String>,
    /// `aud` of every token, the protected resource. Defaults to `public_url`.
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default = "default_code_ttl")]
    pub code_ttl: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: String,
    /// Remember redeemed codes in-process so each can be exchanged once.
    #[serde(default = "default_true")]
    pub single_use_codes: bool,
}

impl ServerConfig {
    pub fn issuer(&self) -> &str {
        self.issuer.as_deref().unwrap_or(&self.public_url)
    }

    pub fn resource(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.public_url)
    }

    pub fn secret_bytes(&self) -> Result<Vec<u8>, String> {
        if self.signing_secret.is_empty() {
            return Err("server.signing_secret is required".to_string());
        }
        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &self.signing_secret,
        )
        .map_err(|e| format!("server.signing_secret is not valid base64: {e}"))?;
        if bytes.len() < 32 {
            return Err(format!(
                "server.signing_secret must be at least 32 bytes when base64-decoded (got {} bytes). Generate with: openssl rand -base64 32",
                bytes.len()
            ));
        }
        Ok(bytes)
    }

    pub fn code_ttl(&self) -> Result<ExpiresIn, String> {
        self.code_ttl
            .parse()
            .map_err(|e| format!("server.code_ttl: {e}"))
    }

    pub fn access_token_ttl(&self) -> Result<ExpiresIn, String> {
        self.access_token_ttl
            .parse()
            .map_err(|e| format!("server.access_token_ttl: {e}"))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_code_ttl() -> String {
    "10m".to_string()
}

fn default_access_token_ttl() -> String {
    "24h".to_string()
}

fn default_true() -> bool {
    true
}

/// Where unauthenticated users are sent and how their identity comes back.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    pub login_url: String,
    #[serde(default = "default_user_header")]
    pub user_header: String,
    #[serde(default = "default_callback_param")]
    pub callback_param: String,
}

fn default_user_header() -> String {
    "x-authenticated-user".to_string()
}

fn default_callback_param() -> String {
    "callback".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_allowed_proofs")]
    pub allowed_proofs: Vec<ProofMechanism>,
    #[serde(default)]
    pub require_proof: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_proofs: default_allowed_proofs(),
            require_proof: false,
        }
    }
}

impl PolicyConfig {
    pub fn proof_policy(&self) -> ProofPolicy {
        ProofPolicy::new(&self.allowed_proofs, self.require_proof)
    }
}

fn default_allowed_proofs() -> Vec<ProofMechanism> {
    vec![ProofMechanism::Pkce, ProofMechanism::ClientSecret]
}

/// Load and validate config from a TOML file, applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse and validate config from a TOML string, applying environment variable overrides.
pub fn parse_config(content: &str) -> Result<Config, String> {
    let mut config: Config =
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML config: {e}"))?;

    apply_env_overrides(&mut config);
    validate(&config)?;

    Ok(config)
}

/// Apply environment variable overrides.
fn apply_env_overrides(config: &mut Config) {
    // STATELESS_OAUTH_SIGNING_SECRET overrides server.signing_secret
    if let Ok(val) = std::env::var("STATELESS_OAUTH_SIGNING_SECRET") {
        config.server.signing_secret = val;
    }
}

/// Validate the entire configuration. Returns an error string on failure.
fn validate(config: &Config) -> Result<(), String> {
    validate_server(&config.server)?;
    validate_session(&config.session)?;
    validate_policy(&config.policy)?;
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), String> {
    validate_public_url("server.public_url", &server.public_url)?;

    server.secret_bytes()?;
    server.code_ttl()?;
    server.access_token_ttl()?;

    if server.issuer().is_empty() {
        return Err("server.issuer must not be empty".to_string());
    }
    if url::Url::parse(server.resource()).is_err() {
        return Err("server.resource must be an absolute URL".to_string());
    }

    Ok(())
}

fn validate_public_url(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field} is required"));
    }

    if value.ends_with('/') {
        return Err(format!("{field} must not have a trailing slash"));
    }

    // Warn (but allow) http:// for local dev; require https:// otherwise
    if value.starts_with("http://") {
        tracing::warn!("{field} uses http://; HTTPS is required for production deployments");
    } else if !value.starts_with("https://") {
        return Err(format!(
            "{field} must start with https:// (or http:// for local dev)"
        ));
    }

    url::Url::parse(value).map_err(|e| format!("{field} is not a valid URL: {e}"))?;
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), String> {
    let login = url::Url::parse(&session.login_url)
        .map_err(|e| format!("session.login_url is not a valid URL: {e}"))?;
    if !matches!(login.scheme(), "http" | "https") {
        return Err("session.login_url must be an HTTP(S) URL".to_string());
    }

    axum::http::HeaderName::try_from(session.user_header.as_str())
        .map_err(|_| format!("session.user_header '{}' is not a valid header name", session.user_header))?;

    if session.callback_param.is_empty() {
        return Err("session.callback_param must not be empty".to_string());
    }

    Ok(())
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), String> {
    if policy.allowed_proofs.is_empty() {
        return Err(
            "policy.allowed_proofs must list at least one of: pkce, client_secret".to_string(),
        );
    }
    Ok(())
}
