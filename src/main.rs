//! roomcast server binary
//!
//! Configuration comes from the environment (and `.env`): `BIND_HOST`,
//! `NATIVE_PORT`, `GATEWAY_PORT`, `GATEWAY_UPSTREAM`, `MAX_CONNECTIONS`,
//! `STORE_TIMEOUT_SECS`, `SUBSCRIBER_QUEUE_CAPACITY`. Log level via `RUST_LOG`.

use std::sync::Arc;
use std::time::Duration;

use roomcast::{ChatServer, InMemoryMessageStore, ServerConfig};

/// How often counters are logged
const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = Arc::new(InMemoryMessageStore::new());
    let server = Arc::new(ChatServer::new(config, store));

    let stats_server = Arc::clone(&server);
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let registry = stats_server.registry().stats();
            let connections = stats_server.stats();
            tracing::info!(
                rooms = registry.rooms,
                subscribers = registry.subscribers,
                published = registry.published,
                dropped = registry.dropped,
                native = connections.active_native_connections,
                gateway = connections.active_gateway_connections,
                rejected = connections.rejected_connections,
                "Server stats"
            );
        }
    });

    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    stats_task.abort();

    if let Err(e) = result {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
