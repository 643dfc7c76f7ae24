//! Scripted in-memory Redis layer for tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::{ConnectionProvider, PubSubClient, PubSubReply, RedisClient, RedisReply};
use crate::error::{Error, Result};
use crate::protocol::RespValue;

/// Address the provider always refuses
pub const UNREACHABLE: &str = "DOESNOTEXIST:1234";

/// Hands out pre-built clients in order
#[derive(Default)]
pub struct MockProvider {
    clients: Mutex<VecDeque<MockClient>>,
    attempts: AtomicUsize,
}

impl MockProvider {
    pub fn new(clients: Vec<MockClient>) -> Self {
        Self {
            clients: Mutex::new(clients.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ConnectionProvider for MockProvider {
    type Client = MockClient;

    async fn get_connection(&self, _protocol: &str, address: &str) -> Result<MockClient> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if address == UNREACHABLE {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "CannotConnect",
            )));
        }
        self.clients.lock().pop_front().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "no scripted connection left",
            ))
        })
    }
}

struct MockState {
    open: AtomicBool,
    closed: watch::Sender<bool>,
    replies: Mutex<VecDeque<PubSubReply>>,
    /// Keep answering `Pong` once the script is exhausted
    heartbeat_forever: bool,
    subscribe_error: Option<String>,
    /// Never answer SUBSCRIBE or commands
    stalled: bool,
    cmd_replies: Mutex<VecDeque<RedisReply>>,
    commands: Mutex<Vec<Vec<String>>>,
    subscribed: Mutex<Vec<String>>,
}

/// Scripted client; clones share one connection state
#[derive(Clone)]
pub struct MockClient {
    state: Arc<MockState>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::build(Vec::new(), false, None)
    }
}

impl MockClient {
    fn build(replies: Vec<PubSubReply>, heartbeat_forever: bool, subscribe_error: Option<String>) -> Self {
        Self::build_with(replies, heartbeat_forever, subscribe_error, false)
    }

    fn build_with(
        replies: Vec<PubSubReply>,
        heartbeat_forever: bool,
        subscribe_error: Option<String>,
        stalled: bool,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            state: Arc::new(MockState {
                open: AtomicBool::new(true),
                closed,
                replies: Mutex::new(replies.into()),
                heartbeat_forever,
                subscribe_error,
                stalled,
                cmd_replies: Mutex::new(VecDeque::new()),
                commands: Mutex::new(Vec::new()),
                subscribed: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Plays `replies`, then blocks until closed
    pub fn with_replies(replies: Vec<PubSubReply>) -> Self {
        Self::build(replies, false, None)
    }

    /// Answers every `receive` with a heartbeat
    pub fn heartbeating() -> Self {
        Self::build(Vec::new(), true, None)
    }

    /// Rejects SUBSCRIBE with `message`
    pub fn failing_subscribe(message: &str) -> Self {
        Self::build(Vec::new(), false, Some(message.to_string()))
    }

    /// Accepts the connection, then never answers
    pub fn stalled() -> Self {
        Self::build_with(Vec::new(), false, None, true)
    }

    /// Queue a reply for the next `cmd`
    pub fn push_cmd_reply(&self, reply: RedisReply) -> &Self {
        self.state.cmd_replies.lock().push_back(reply);
        self
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.commands.lock().clone()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.state.subscribed.lock().clone()
    }
}

impl RedisClient for MockClient {
    type PubSub = MockPubSub;

    async fn cmd(&self, args: &[&str]) -> Result<RedisReply> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        if self.state.stalled {
            std::future::pending::<()>().await;
        }
        self.state
            .commands
            .lock()
            .push(args.iter().map(|a| a.to_string()).collect());
        Ok(self
            .state
            .cmd_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| RespValue::simple_string("OK")))
    }

    fn pubsub(&self) -> MockPubSub {
        MockPubSub {
            state: self.state.clone(),
        }
    }

    fn close(&self) {
        self.state.open.store(false, Ordering::SeqCst);
        self.state.closed.send_replace(true);
    }

    fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }
}

pub struct MockPubSub {
    state: Arc<MockState>,
}

impl PubSubClient for MockPubSub {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<()> {
        if self.state.stalled {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &self.state.subscribe_error {
            return Err(Error::Reply(message.clone()));
        }
        self.state
            .subscribed
            .lock()
            .extend(channels.iter().map(|c| c.to_string()));
        Ok(())
    }

    async fn receive(&mut self) -> PubSubReply {
        // Let `close` and other tasks interleave with a chatty script
        tokio::task::yield_now().await;

        if !self.state.open.load(Ordering::SeqCst) {
            return PubSubReply::Error(Error::ConnectionClosed);
        }

        let next = self.state.replies.lock().pop_front();
        if let Some(reply) = next {
            return reply;
        }
        if self.state.heartbeat_forever {
            return PubSubReply::Pong {
                payload: String::new(),
            };
        }

        let mut closed = self.state.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
        PubSubReply::Error(Error::ConnectionClosed)
    }
}

/// A keep-alive message as produced by an idle subscription
pub fn heartbeat() -> PubSubReply {
    PubSubReply::Pong {
        payload: String::new(),
    }
}

pub fn message(channel: &str, payload: &str) -> PubSubReply {
    PubSubReply::Message {
        channel: channel.to_string(),
        payload: payload.to_string(),
    }
}

pub fn failure() -> PubSubReply {
    PubSubReply::Error(Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    )))
}
