use clap::Parser;
use stateless_oauth::{config, routes};
use std::path::PathBuf;
use std::sync::Arc;

/// Stateless OAuth 2.0 authorization server. Issues signed authorization
/// codes and bearer tokens with no server-side session store.
#[derive(Parser, Debug)]
#[command(name = "stateless-oauth", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // CLI --port overrides config
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    let state = match routes::AppState::from_config(&cfg) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        issuer = %state.codec.issuer(),
        resource = %state.codec.audience(),
        code_ttl_secs = state.code_ttl.as_secs(),
        access_token_ttl_secs = state.access_token_ttl.as_secs(),
        single_use_codes = state.redeemed.is_some(),
        allowed_proofs = ?cfg.policy.allowed_proofs,
        require_proof = cfg.policy.require_proof,
        "Configuration loaded successfully"
    );

    let app = routes::router(state);

    let bind_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("Listening on {bind_addr}");
    tracing::info!("Public URL: {}", cfg.server.public_url);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
