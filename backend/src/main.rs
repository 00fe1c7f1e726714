use std::sync::Arc;

use tokio::net::TcpListener;

use marketplace_backend::{
    logging, routes, AppState, Config, IdentityToolkitClient, JwksVerifier, SqliteUserStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    logging::init(&config.logging.level);

    tracing::info!("Starting marketplace backend");

    // Initialize components
    let verifier = JwksVerifier::new(&config.oidc).await?;
    tracing::info!("Verifying ID tokens from {}", config.oidc.issuer);

    let store = SqliteUserStore::new(&config.database.url)?;
    tracing::info!("User store opened at {}", config.database.url);

    if config.identity_toolkit.api_key.is_empty() {
        tracing::warn!("identity_toolkit.api_key is empty, password sign-up will fail");
    }
    let accounts = IdentityToolkitClient::new(&config.identity_toolkit);

    if !config.server.is_production() {
        tracing::warn!(
            "Running in {} mode, session cookies are not marked Secure",
            config.server.environment
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        Arc::new(verifier),
        Arc::new(store),
        Arc::new(accounts),
    ));

    let app = routes::app(state);

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
