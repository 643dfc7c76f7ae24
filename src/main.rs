use std::sync::Arc;

use tokio::sync::watch;

use sentinel_watch::cli::Cli;
use sentinel_watch::redis::tcp::TcpConnectionProvider;
use sentinel_watch::topology::TopologyRequest;
use sentinel_watch::{Manager, TopologyManager, Watcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::load_config().unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = sentinel_watch::logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
        // Fall back to env_logger
        env_logger::init();
    }

    log::info!(
        "sentinel-watch {} watching {} sentinel(s)",
        env!("CARGO_PKG_VERSION"),
        config.sentinels.len()
    );

    let provider = Arc::new(TcpConnectionProvider::new(
        config.connect_timeout(),
        config.heartbeat_interval(),
    ));
    let manager = Arc::new(TopologyManager::new());
    let watcher = Arc::new(
        Watcher::new(provider, manager.clone())
            .with_options(config.client_options())
            .with_reconnect_interval(config.reconnect_interval()),
    );

    let (shutdown_tx, shutdown) = watch::channel(false);
    let mut watchers = tokio::spawn(watcher.run(config.sentinels.clone(), shutdown));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutdown signal received.");
        }
        result = &mut watchers => {
            if let Err(e) = result {
                log::error!("Watcher stopped unexpectedly: {}", e);
            }
        }
    }

    shutdown_tx.send_replace(true);
    if !watchers.is_finished()
        && let Err(e) = watchers.await
    {
        log::error!("Watcher failed during shutdown: {}", e);
    }

    let (request, state) = TopologyRequest::channel();
    manager.get_state(request);
    let state = state.await?;
    for (sentinel, status) in &state.sentinels {
        log::info!(
            "Sentinel {}: {:?}, {} ping(s)",
            sentinel,
            status.link,
            status.pings
        );
    }
    for (name, address) in &state.masters {
        log::info!("Master {} at {}", name, address);
    }

    log::logger().flush();
    Ok(())
}
