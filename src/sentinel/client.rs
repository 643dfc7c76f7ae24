//! Sentinel Client
//!
//! Owns one Sentinel connection and its subscription, runs the receive loop
//! and turns replies into `SentinelEvent`s for the registered `Manager`.
//!
//! Liveness is edge-triggered: `Added` once per lost->healthy transition,
//! `Lost` once per healthy->lost transition. The loop ends on loss; a new
//! client has to be constructed to retry.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::events::{SUBSCRIBED_CHANNELS, SentinelEvent, classify};
use super::manager::Manager;
use super::types::Sentinel;
use crate::error::{Error, Result};
use crate::redis::{ConnectionProvider, PubSubClient, PubSubReply, RedisClient};

/// Protocol handed to the connection provider
pub(crate) const PROTOCOL: &str = "tcp";

/// Credentials sent with AUTH before subscribing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub auth: Option<Credentials>,
}

/// Edge detector for Added/Lost
#[derive(Debug, Default)]
struct LinkState {
    healthy: bool,
    lost: bool,
}

impl LinkState {
    /// True for the first reply since start or since the last loss
    fn mark_healthy(&mut self) -> bool {
        self.lost = false;
        !std::mem::replace(&mut self.healthy, true)
    }

    /// True unless the loss was already reported
    fn mark_lost(&mut self) -> bool {
        self.healthy = false;
        !std::mem::replace(&mut self.lost, true)
    }
}

struct Inner<C> {
    sentinel: Sentinel,
    connection: C,
    manager: Arc<dyn Manager>,
    /// Set by `close`; held while notifying so nothing is delivered after close
    closed: Mutex<bool>,
}

impl<C: RedisClient> Inner<C> {
    /// Deliver an event unless the client was closed. Returns false once closed.
    fn emit(&self, event: SentinelEvent) -> bool {
        let closed = self.closed.lock();
        if *closed {
            return false;
        }
        log::debug!("Sentinel {} event: {}", self.sentinel, event.kind());
        self.manager.notify(event);
        true
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

/// Client for a single Sentinel
pub struct SentinelClient<C: RedisClient> {
    inner: Arc<Inner<C>>,
    task: Option<JoinHandle<()>>,
}

impl<C: RedisClient> SentinelClient<C> {
    /// Connect, subscribe and start the receive loop
    pub async fn connect<P>(sentinel: Sentinel, provider: &P, manager: Arc<dyn Manager>) -> Result<Self>
    where
        P: ConnectionProvider<Client = C>,
    {
        Self::connect_with(sentinel, provider, manager, &ClientOptions::default()).await
    }

    pub async fn connect_with<P>(
        sentinel: Sentinel,
        provider: &P,
        manager: Arc<dyn Manager>,
        options: &ClientOptions,
    ) -> Result<Self>
    where
        P: ConnectionProvider<Client = C>,
    {
        sentinel.validate()?;
        let address = sentinel.address();
        let connect_failed = |reason: String| Error::ConnectFailed {
            address: address.clone(),
            reason,
        };

        let connection = provider
            .get_connection(PROTOCOL, &address)
            .await
            .map_err(|e| connect_failed(e.to_string()))?;

        if let Some(auth) = &options.auth
            && let Err(e) = authenticate(&connection, auth).await
        {
            connection.close();
            return Err(connect_failed(format!("authentication failed: {}", e)));
        }

        let mut pubsub = connection.pubsub();
        if let Err(e) = pubsub.subscribe(SUBSCRIBED_CHANNELS).await {
            connection.close();
            return Err(connect_failed(format!("subscribe failed: {}", e)));
        }

        log::info!(
            "Subscribed to sentinel {} ({})",
            sentinel,
            SUBSCRIBED_CHANNELS.join(", ")
        );

        let inner = Arc::new(Inner {
            sentinel,
            connection,
            manager,
            closed: Mutex::new(false),
        });
        let task = tokio::spawn(receive_loop(inner.clone(), pubsub));

        Ok(Self {
            inner,
            task: Some(task),
        })
    }

    pub fn sentinel(&self) -> &Sentinel {
        &self.inner.sentinel
    }

    /// Stop the loop and release the connection. Idempotent, never emits `Lost`.
    pub fn close(&self) {
        {
            let mut closed = self.inner.closed.lock();
            if *closed {
                return;
            }
            *closed = true;
        }

        log::info!("Closing sentinel client for {}", self.inner.sentinel);
        self.inner.connection.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// True once the receive loop has terminated
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the receive loop to terminate (after loss or `close`).
    /// Cancel-safe: the handle is only released once the loop has ended.
    pub async fn wait(&mut self) {
        let Some(task) = self.task.as_mut() else {
            return;
        };

        let result = task.await;
        self.task = None;
        if let Err(e) = result {
            log::error!("Receive loop for {} failed: {}", self.inner.sentinel, e);
        }
    }
}

pub(crate) async fn authenticate<C: RedisClient>(connection: &C, auth: &Credentials) -> Result<()> {
    let reply = match &auth.user {
        Some(user) => {
            connection
                .cmd(&["AUTH", user.as_str(), auth.password.as_str()])
                .await?
        }
        None => connection.cmd(&["AUTH", auth.password.as_str()]).await?,
    };
    reply.into_result().map(|_| ())
}

async fn receive_loop<C: RedisClient>(inner: Arc<Inner<C>>, mut pubsub: C::PubSub) {
    let mut link = LinkState::default();

    loop {
        let reply = pubsub.receive().await;

        let failure = match &reply {
            PubSubReply::Error(e) => Some(Error::SubscriptionLost(e.to_string())),
            PubSubReply::Timeout => Some(Error::SubscriptionLost("receive timed out".into())),
            _ => None,
        };

        if let Some(failure) = failure {
            if inner.is_closed() {
                log::debug!("Receive loop for {} stopped by close", inner.sentinel);
            } else {
                log::warn!("Sentinel {}: {}", inner.sentinel, failure);
                if link.mark_lost() {
                    inner.emit(SentinelEvent::Lost {
                        sentinel: inner.sentinel.clone(),
                    });
                }
            }
            break;
        }

        if link.mark_healthy()
            && !inner.emit(SentinelEvent::Added {
                sentinel: inner.sentinel.clone(),
            })
        {
            break;
        }

        match classify(&inner.sentinel, &reply) {
            Ok(Some(event)) => {
                if !inner.emit(event) {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Sentinel {}: dropping message: {}", inner.sentinel, e),
        }
    }

    inner.connection.close();
}
