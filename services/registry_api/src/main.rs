use clap::Parser;
use tracing::info;

use registry_api::{router, AppState, Config, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Store::open(&config.db_path())
        .map_err(|e| anyhow::anyhow!("failed to open registry store: {}", e))?;
    info!("Opened registry store at {}", config.db_path().display());

    match &config.ipfs_api_url {
        Some(url) => info!("Pinning documents through IPFS node {}", url),
        None => info!("No IPFS node configured, pinning documents locally"),
    }
    info!(
        "Stellar {} via {}, contract {}",
        config.network.as_str(),
        config.rpc_url(),
        config.contract_id.as_deref().unwrap_or("<unset>")
    );

    let listen = config.listen;
    let app = router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Land registry API listening on {}", listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
