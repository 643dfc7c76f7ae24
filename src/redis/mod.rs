//! Redis connection capabilities
//!
//! The Sentinel client only talks to Redis through these traits:
//! - `ConnectionProvider` dials an address
//! - `RedisClient` issues commands and hands out a pub/sub handle
//! - `PubSubClient` subscribes and suspends in `receive`
//!
//! `tcp` is the production implementation; `mock` backs the tests.

use std::future::Future;

use crate::error::{Error, Result};
use crate::protocol::RespValue;

#[cfg(test)]
pub mod mock;
pub mod tcp;

/// Reply to a regular command
pub type RedisReply = RespValue;

/// Dials Redis endpoints
pub trait ConnectionProvider: Send + Sync {
    type Client: RedisClient;

    /// Open a connection to `address` ("host:port") using `protocol` ("tcp")
    fn get_connection(
        &self,
        protocol: &str,
        address: &str,
    ) -> impl Future<Output = Result<Self::Client>> + Send;
}

/// A connected Redis client
pub trait RedisClient: Send + Sync + 'static {
    type PubSub: PubSubClient;

    /// Issue a command; error replies come back as `RespValue::Error`
    fn cmd(&self, args: &[&str]) -> impl Future<Output = Result<RedisReply>> + Send;

    /// Pub/sub handle sharing this client's connection
    fn pubsub(&self) -> Self::PubSub;

    /// Close the underlying connection. Idempotent; wakes a pending `receive`.
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Subscription side of a connection
pub trait PubSubClient: Send + 'static {
    /// Subscribe and wait until every channel registration is confirmed
    fn subscribe(&mut self, channels: &[&str]) -> impl Future<Output = Result<()>> + Send;

    /// Suspend until a push message, a definitive timeout or an error
    fn receive(&mut self) -> impl Future<Output = PubSubReply> + Send;
}

/// Result of a single `receive`
#[derive(Debug)]
pub enum PubSubReply {
    Subscribe { channel: String, count: i64 },
    Unsubscribe { channel: String, count: i64 },
    Message { channel: String, payload: String },
    Pong { payload: String },
    Timeout,
    Error(Error),
}

impl PubSubReply {
    /// Map a RESP push frame onto a reply
    pub fn from_push(value: RespValue) -> Self {
        let items = match value {
            RespValue::Array(items) if !items.is_empty() => items,
            RespValue::Error(e) => {
                return Self::Error(Error::Reply(String::from_utf8_lossy(&e).into_owned()));
            }
            other => {
                return Self::Error(Error::Protocol(format!(
                    "unexpected pub/sub frame: {:?}",
                    other
                )));
            }
        };

        let text = |idx: usize| {
            items
                .get(idx)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let count = |idx: usize| items.get(idx).and_then(|v| v.as_int()).unwrap_or(0);

        let kind = text(0).to_ascii_lowercase();
        match (kind.as_str(), items.len()) {
            ("message", 3) => Self::Message {
                channel: text(1),
                payload: text(2),
            },
            ("pmessage", 4) => Self::Message {
                channel: text(2),
                payload: text(3),
            },
            ("subscribe" | "psubscribe", 3) => Self::Subscribe {
                channel: text(1),
                count: count(2),
            },
            ("unsubscribe" | "punsubscribe", 3) => Self::Unsubscribe {
                channel: text(1),
                count: count(2),
            },
            ("pong", _) => Self::Pong { payload: text(1) },
            _ => Self::Error(Error::Protocol(format!(
                "unexpected pub/sub push '{}' with {} elements",
                kind,
                items.len()
            ))),
        }
    }

    #[inline]
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    #[inline]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Subscribe { channel, .. }
            | Self::Unsubscribe { channel, .. }
            | Self::Message { channel, .. } => Some(channel),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Message { payload, .. } | Self::Pong { payload } => Some(payload),
            _ => None,
        }
    }
}
