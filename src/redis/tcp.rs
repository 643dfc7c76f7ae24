//! RESP2 over TCP
//!
//! One socket per `TcpRedisClient`. The pub/sub handle shares that socket, so
//! closing the client wakes a `receive` that is parked on a read.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;

use super::{ConnectionProvider, PubSubClient, PubSubReply, RedisClient, RedisReply};
use crate::error::{Error, Result};
use crate::protocol::{Parser, RespValue, encode_command};

/// Initial read buffer size
const READ_BUF_SIZE: usize = 16 * 1024;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Default idle interval before a subscription sends PING
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5000;

/// Dials Redis/Sentinel endpoints over plain TCP.
///
/// `connect_timeout` also bounds every command and the SUBSCRIBE handshake.
#[derive(Debug, Clone)]
pub struct TcpConnectionProvider {
    connect_timeout: Duration,
    heartbeat_interval: Duration,
}

impl Default for TcpConnectionProvider {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
        )
    }
}

impl TcpConnectionProvider {
    pub fn new(connect_timeout: Duration, heartbeat_interval: Duration) -> Self {
        Self {
            connect_timeout,
            heartbeat_interval,
        }
    }
}

impl ConnectionProvider for TcpConnectionProvider {
    type Client = TcpRedisClient;

    async fn get_connection(&self, protocol: &str, address: &str) -> Result<TcpRedisClient> {
        if !protocol.eq_ignore_ascii_case("tcp") {
            return Err(Error::Protocol(format!(
                "unsupported protocol '{}'",
                protocol
            )));
        }

        let stream = match timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(Error::Timeout),
        };
        stream.set_nodelay(true)?;

        log::debug!("Connected to {}", address);
        Ok(TcpRedisClient::new(
            stream,
            self.connect_timeout,
            self.heartbeat_interval,
        ))
    }
}

/// Socket plus its unparsed input
struct Link {
    stream: TcpStream,
    buf: BytesMut,
}

impl Link {
    async fn send(&mut self, parts: &[&str]) -> Result<()> {
        self.stream.write_all(&encode_command(parts)).await?;
        Ok(())
    }

    /// Read exactly one RESP frame
    async fn read_value(&mut self) -> Result<RespValue> {
        loop {
            if let Some(value) = Parser::parse(&mut self.buf)? {
                return Ok(value);
            }

            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    async fn request(&mut self, parts: &[&str]) -> Result<RespValue> {
        self.send(parts).await?;
        self.read_value().await
    }

    /// Send SUBSCRIBE and consume one confirmation per channel, in order
    async fn subscribe(&mut self, channels: &[&str]) -> Result<()> {
        let mut args = Vec::with_capacity(channels.len() + 1);
        args.push("SUBSCRIBE");
        args.extend_from_slice(channels);
        self.send(&args).await?;

        for expected in channels {
            match PubSubReply::from_push(self.read_value().await?) {
                PubSubReply::Subscribe { channel, .. } if channel == *expected => {}
                PubSubReply::Error(e) => return Err(e),
                other => {
                    return Err(Error::Protocol(format!(
                        "expected subscribe confirmation for '{}', got {:?}",
                        expected, other
                    )));
                }
            }
        }

        Ok(())
    }

    /// Wait for the next push. An idle link is probed with PING once; a second
    /// idle interval without any frame is a definitive timeout.
    async fn next_push(&mut self, interval: Duration, awaiting_pong: &mut bool) -> PubSubReply {
        loop {
            match timeout(interval, self.read_value()).await {
                Ok(Ok(value)) => {
                    *awaiting_pong = false;
                    return PubSubReply::from_push(value);
                }
                Ok(Err(e)) => return PubSubReply::Error(e),
                Err(_) if *awaiting_pong => return PubSubReply::Timeout,
                Err(_) => {
                    if let Err(e) = self.send(&["PING"]).await {
                        return PubSubReply::Error(e);
                    }
                    *awaiting_pong = true;
                }
            }
        }
    }
}

struct Shared {
    link: Mutex<Option<Link>>,
    closed: watch::Sender<bool>,
    request_timeout: Duration,
    heartbeat_interval: Duration,
}

impl Shared {
    /// Drop the socket after a transport failure
    fn fail(&self, link: &mut Option<Link>) {
        link.take();
        self.closed.send_replace(true);
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Redis client over one TCP connection
#[derive(Clone)]
pub struct TcpRedisClient {
    shared: Arc<Shared>,
}

impl TcpRedisClient {
    fn new(stream: TcpStream, request_timeout: Duration, heartbeat_interval: Duration) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                link: Mutex::new(Some(Link {
                    stream,
                    buf: BytesMut::with_capacity(READ_BUF_SIZE),
                })),
                closed,
                request_timeout,
                heartbeat_interval,
            }),
        }
    }
}

impl RedisClient for TcpRedisClient {
    type PubSub = TcpPubSubClient;

    async fn cmd(&self, args: &[&str]) -> Result<RedisReply> {
        let mut closed = self.shared.closed.subscribe();
        let mut guard = self.shared.link.lock().await;
        let link = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        let outcome = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => None,
            result = timeout(self.shared.request_timeout, link.request(args)) => {
                Some(result.unwrap_or(Err(Error::Timeout)))
            }
        };

        match outcome {
            None => {
                guard.take();
                Err(Error::ConnectionClosed)
            }
            Some(Err(e)) => {
                self.shared.fail(&mut guard);
                Err(e)
            }
            Some(Ok(reply)) => Ok(reply),
        }
    }

    fn pubsub(&self) -> TcpPubSubClient {
        TcpPubSubClient {
            shared: self.shared.clone(),
            closed: self.shared.closed.subscribe(),
            awaiting_pong: false,
        }
    }

    fn close(&self) {
        if !self.shared.closed.send_replace(true) {
            log::debug!("Closing redis connection");
        }
        // A busy link is dropped by whoever holds it once they see the flag
        if let Ok(mut link) = self.shared.link.try_lock() {
            link.take();
        }
    }

    fn is_open(&self) -> bool {
        !*self.shared.closed.borrow()
    }
}

/// Subscription side of a `TcpRedisClient`
pub struct TcpPubSubClient {
    shared: Arc<Shared>,
    closed: watch::Receiver<bool>,
    awaiting_pong: bool,
}

impl PubSubClient for TcpPubSubClient {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<()> {
        let shared = self.shared.clone();
        let mut guard = shared.link.lock().await;
        let link = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        let outcome = tokio::select! {
            biased;
            _ = wait_closed(&mut self.closed) => None,
            result = timeout(shared.request_timeout, link.subscribe(channels)) => {
                Some(result.unwrap_or(Err(Error::Timeout)))
            }
        };

        match outcome {
            None => {
                guard.take();
                Err(Error::ConnectionClosed)
            }
            Some(Err(e)) => {
                shared.fail(&mut guard);
                Err(e)
            }
            Some(Ok(())) => Ok(()),
        }
    }

    async fn receive(&mut self) -> PubSubReply {
        let shared = self.shared.clone();
        let mut guard = shared.link.lock().await;
        let Some(link) = guard.as_mut() else {
            return PubSubReply::Error(Error::ConnectionClosed);
        };

        let outcome = tokio::select! {
            biased;
            _ = wait_closed(&mut self.closed) => None,
            reply = link.next_push(shared.heartbeat_interval, &mut self.awaiting_pong) => Some(reply),
        };

        match outcome {
            None => {
                guard.take();
                PubSubReply::Error(Error::ConnectionClosed)
            }
            Some(reply @ (PubSubReply::Error(_) | PubSubReply::Timeout)) => {
                shared.fail(&mut guard);
                reply
            }
            Some(reply) => reply,
        }
    }
}
