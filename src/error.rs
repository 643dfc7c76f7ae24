use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to sentinel at {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("invalid sentinel: {0}")]
    InvalidSentinel(String),

    #[error("subscription lost: {0}")]
    SubscriptionLost(String),

    #[error("malformed payload on '{channel}': {reason}")]
    MalformedPayload { channel: String, reason: String },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Reply(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
