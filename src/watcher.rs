//! Sentinel Watcher
//!
//! Keeps one `SentinelClient` per configured Sentinel. A client that fails to
//! connect or loses its subscription is rebuilt after `reconnect_interval`.
//! Each successful connect is followed by a `SENTINEL MASTERS` discovery on a
//! separate connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::redis::{ConnectionProvider, RedisClient};
use crate::sentinel::client::{PROTOCOL, authenticate};
use crate::sentinel::{ClientOptions, Manager, Sentinel, SentinelClient, query};
use crate::topology::TopologyManager;

/// Default delay between reconnect attempts
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;

pub struct Watcher<P: ConnectionProvider> {
    provider: Arc<P>,
    manager: Arc<TopologyManager>,
    options: ClientOptions,
    reconnect_interval: Duration,
}

impl<P: ConnectionProvider> Watcher<P> {
    pub fn new(provider: Arc<P>, manager: Arc<TopologyManager>) -> Self {
        Self {
            provider,
            manager,
            options: ClientOptions::default(),
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn manager(&self) -> &Arc<TopologyManager> {
        &self.manager
    }

    /// Watch one Sentinel until `shutdown` flips to true (or its sender is dropped)
    pub async fn watch(&self, sentinel: Sentinel, mut shutdown: watch::Receiver<bool>) {
        loop {
            let stop = *shutdown.borrow();
            if stop {
                return;
            }

            let manager: Arc<dyn Manager> = self.manager.clone();
            let connected = tokio::select! {
                result = SentinelClient::connect_with(
                    sentinel.clone(),
                    self.provider.as_ref(),
                    manager,
                    &self.options,
                ) => result,
                _ = shutdown.wait_for(|stop| *stop) => return,
            };

            match connected {
                Ok(mut client) => {
                    // Discovery runs beside the subscription and is abandoned on loss
                    let discovery = self.discover(&sentinel);
                    tokio::pin!(discovery);
                    let mut discovering = true;

                    let stopped = loop {
                        tokio::select! {
                            result = &mut discovery, if discovering => {
                                discovering = false;
                                if let Err(e) = result {
                                    log::warn!("Discovery via sentinel {} failed: {}", sentinel, e);
                                }
                            }
                            _ = client.wait() => break false,
                            _ = shutdown.wait_for(|stop| *stop) => break true,
                        }
                    };
                    if stopped {
                        client.close();
                        client.wait().await;
                        return;
                    }
                }
                Err(e) => log::warn!("Sentinel {} unavailable: {}", sentinel, e),
            }

            log::debug!(
                "Reconnecting to sentinel {} in {:?}",
                sentinel,
                self.reconnect_interval
            );
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_interval) => {}
                _ = shutdown.wait_for(|stop| *stop) => return,
            }
        }
    }

    /// Run `SENTINEL MASTERS` on a fresh connection and seed the manager
    pub async fn discover(&self, sentinel: &Sentinel) -> Result<()> {
        let connection = self
            .provider
            .get_connection(PROTOCOL, &sentinel.address())
            .await?;

        let result = async {
            if let Some(auth) = &self.options.auth {
                authenticate(&connection, auth).await?;
            }
            let mut masters = query::masters(&connection).await?;

            // A down master may already have a promoted replica
            for master in masters.iter_mut().filter(|master| master.is_down()) {
                if let Some(address) = query::master_address(&connection, &master.name).await? {
                    master.address = address;
                }
            }
            Ok::<_, Error>(masters)
        }
        .await;
        connection.close();

        let masters = result?;
        log::debug!(
            "Sentinel {} monitors {} master(s)",
            sentinel,
            masters.len()
        );
        self.manager.seed_masters(&masters);
        Ok(())
    }
}

impl<P: ConnectionProvider + 'static> Watcher<P> {
    /// Watch every Sentinel concurrently until shutdown
    pub async fn run(self: Arc<Self>, sentinels: Vec<Sentinel>, shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        for sentinel in sentinels {
            let watcher = self.clone();
            let shutdown = shutdown.clone();
            tasks.spawn(async move { watcher.watch(sentinel, shutdown).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                log::error!("Sentinel watch task failed: {}", e);
            }
        }
    }
}
