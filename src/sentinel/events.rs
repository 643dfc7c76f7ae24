//! Sentinel Events
//!
//! Typed events produced from a Sentinel's Pub/Sub stream.

use super::types::{Address, Sentinel};
use crate::error::{Error, Result};
use crate::redis::PubSubReply;

/// Failover announcements: "<master name> <oldip> <oldport> <newip> <newport>"
pub const SWITCH_MASTER_CHANNEL: &str = "+switch-master";

/// Published when a Sentinel discovers another Sentinel
pub const PRESENCE_CHANNEL: &str = "+sentinel";

/// Channels every Sentinel client subscribes to
pub const SUBSCRIBED_CHANNELS: &[&str] = &[SWITCH_MASTER_CHANNEL, PRESENCE_CHANNEL];

/// Events delivered to a `Manager`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelEvent {
    /// Heartbeat or no-op message seen on the subscription
    Ping { sentinel: Sentinel },
    /// Sentinel became reachable (first reply since start or since loss)
    Added { sentinel: Sentinel },
    /// Subscription failed; the Sentinel is no longer a source of truth
    Lost { sentinel: Sentinel },
    /// A master was failed over to a new address
    MasterSwitched {
        sentinel: Sentinel,
        master_name: String,
        old_address: Address,
        new_address: Address,
    },
}

impl SentinelEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::Added { .. } => "added",
            Self::Lost { .. } => "lost",
            Self::MasterSwitched { .. } => "master-switched",
        }
    }

    /// The Sentinel that produced this event
    pub fn sentinel(&self) -> &Sentinel {
        match self {
            Self::Ping { sentinel }
            | Self::Added { sentinel }
            | Self::Lost { sentinel }
            | Self::MasterSwitched { sentinel, .. } => sentinel,
        }
    }
}

/// Translate one successful reply into at most one event.
///
/// `Ok(None)` is never returned for a reply that proves liveness; anything
/// that cannot be understood is `Error::MalformedPayload`.
pub fn classify(sentinel: &Sentinel, reply: &PubSubReply) -> Result<Option<SentinelEvent>> {
    let ping = || {
        Ok(Some(SentinelEvent::Ping {
            sentinel: sentinel.clone(),
        }))
    };

    match reply {
        PubSubReply::Subscribe { .. } | PubSubReply::Unsubscribe { .. } | PubSubReply::Pong { .. } => {
            ping()
        }
        PubSubReply::Message { payload, .. } if payload.trim().is_empty() => ping(),
        PubSubReply::Message { channel, .. } if channel == PRESENCE_CHANNEL => ping(),
        PubSubReply::Message { channel, payload } if channel == SWITCH_MASTER_CHANNEL => {
            parse_switch_master(sentinel, payload).map(Some)
        }
        PubSubReply::Message { channel, .. } => Err(Error::MalformedPayload {
            channel: channel.clone(),
            reason: "unexpected channel".to_string(),
        }),
        // Failures are handled by the receive loop before classification
        PubSubReply::Timeout | PubSubReply::Error(_) => Ok(None),
    }
}

/// Parse a `+switch-master` payload
pub fn parse_switch_master(sentinel: &Sentinel, payload: &str) -> Result<SentinelEvent> {
    let malformed = |reason: String| Error::MalformedPayload {
        channel: SWITCH_MASTER_CHANNEL.to_string(),
        reason,
    };

    let parts: Vec<&str> = payload.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(malformed(format!(
            "expected 5 fields, got {} in '{}'",
            parts.len(),
            payload
        )));
    }

    let port = |s: &str| match s.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(malformed(format!("invalid port '{}'", s))),
    };

    Ok(SentinelEvent::MasterSwitched {
        sentinel: sentinel.clone(),
        master_name: parts[0].to_string(),
        old_address: Address::new(parts[1], port(parts[2])?),
        new_address: Address::new(parts[3], port(parts[4])?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel() -> Sentinel {
        Sentinel::new("10.0.0.5", 26379)
    }

    fn message(channel: &str, payload: &str) -> PubSubReply {
        PubSubReply::Message {
            channel: channel.to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_switch_master_parsed() {
        let event = classify(
            &sentinel(),
            &message("+switch-master", "mymaster 127.0.0.1 6379 127.0.0.1 6380"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            event,
            SentinelEvent::MasterSwitched {
                sentinel: sentinel(),
                master_name: "mymaster".to_string(),
                old_address: Address::new("127.0.0.1", 6379),
                new_address: Address::new("127.0.0.1", 6380),
            }
        );
        assert_eq!(event.kind(), "master-switched");
        assert_eq!(event.sentinel(), &sentinel());
    }

    #[test]
    fn test_switch_master_malformed() {
        for payload in [
            "mymaster 127.0.0.1 6379",
            "mymaster 127.0.0.1 6379 127.0.0.1 6380 extra",
            "mymaster 127.0.0.1 port 127.0.0.1 6380",
            "mymaster 127.0.0.1 6379 127.0.0.1 0",
            "mymaster 127.0.0.1 6379 127.0.0.1 70000",
        ] {
            let result = classify(&sentinel(), &message("+switch-master", payload));
            assert!(
                matches!(result, Err(Error::MalformedPayload { .. })),
                "payload '{}' should be rejected",
                payload
            );
        }
    }

    #[test]
    fn test_keepalive_replies_are_pings() {
        let replies = [
            PubSubReply::Subscribe {
                channel: "+switch-master".to_string(),
                count: 1,
            },
            PubSubReply::Unsubscribe {
                channel: "+switch-master".to_string(),
                count: 0,
            },
            PubSubReply::Pong {
                payload: String::new(),
            },
            message("+switch-master", ""),
            message(
                "+sentinel",
                "sentinel 10.0.0.6:26379 10.0.0.6 26379 @ mymaster 10.0.0.1 6379",
            ),
        ];

        for reply in &replies {
            let event = classify(&sentinel(), reply).unwrap().unwrap();
            assert_eq!(
                event,
                SentinelEvent::Ping {
                    sentinel: sentinel()
                }
            );
        }
    }

    #[test]
    fn test_unknown_channel_is_malformed() {
        let result = classify(&sentinel(), &message("+sdown", "master mymaster 10.0.0.1 6379"));
        match result {
            Err(Error::MalformedPayload { channel, .. }) => assert_eq!(channel, "+sdown"),
            other => panic!("Expected malformed payload, got {:?}", other),
        }
    }
}
