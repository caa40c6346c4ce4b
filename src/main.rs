use managed_nonces::{
    api::Server,
    config::Config,
    state::StateCache,
};
use tracing::info;

/// The main entry point for the nonce service.
///
/// Initializes logging, loads the configuration (first argument, or
/// `config/default.toml`), seeds the in-memory ledger and serves the API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Nonce service starting with config: {:?}", config);

    // Canonical nonces come from the configured genesis accounts
    let state_cache = StateCache::from_accounts(config.ledger.accounts.clone());

    let server = Server::new(config, state_cache);
    server.start().await?;

    Ok(())
}
