use balance_sync::{
    api::Server,
    chain::{Connection, EthAddressValidator, EthersProvider, Session},
    config::Config,
    BalanceTracker,
};
use std::sync::Arc;
use tracing::info;

/// The main entry point for the balance service.
///
/// Loads the configuration, connects to the node, starts the block listener,
/// mounts the configured watches and serves the JSON-RPC API until Ctrl-C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Balance service starting with config: {:?}", config);

    let (provider, chain_id) = EthersProvider::connect(&config.provider.ws_url).await?;
    let session = Session::new();
    session.connect(Connection::new(chain_id, Arc::new(provider)));

    let tracker = Arc::new(BalanceTracker::new(
        session.clone(),
        Arc::new(EthAddressValidator),
    ));

    // Kept for the whole run; dropping it unsubscribes from blocks
    let listener = tracker.start_listener();

    for watch in &config.watch {
        tracker.watch(&watch.token, &watch.owner);
        info!("Watching {} balance of {}", watch.token, watch.owner);
    }

    let server = Server::new(config.api.clone(), tracker.clone());
    server
        .start(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    tracker.shutdown();
    listener.shutdown().await;
    session.disconnect();
    info!("Balance service stopped");

    Ok(())
}
