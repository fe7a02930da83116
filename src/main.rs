use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bookd::config::Config;
use bookd::engine::{Engine, SystemClock};
use bookd::store::WalStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    bookd::observability::init(config.metrics_port);

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(WalStore::open(config.wal_path())?);
    tokio::spawn(bookd::compactor::run_compactor(
        store.clone(),
        config.compact_threshold,
        Duration::from_secs(30),
    ));
    let engine = Arc::new(Engine::new(store, Arc::new(SystemClock)));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("bookd listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  max_connections: {}", config.max_connections);
    info!("  compact_threshold: {}", config.compact_threshold);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    bookd::server::serve(
        listener,
        engine,
        config.max_connections,
        bookd::server::shutdown_signal(),
    )
    .await?;

    info!("bookd stopped");
    Ok(())
}
