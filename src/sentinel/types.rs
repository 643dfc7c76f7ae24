//! Endpoint identities

use std::fmt;

use crate::error::{Error, Result};

/// Identity of a monitored Sentinel process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sentinel {
    pub host: String,
    pub port: u16,
}

impl Sentinel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse "host:port"
    pub fn from_address(addr: &str) -> Result<Self> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidSentinel(format!("missing port in '{}'", addr)))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::InvalidSentinel(format!("invalid port in '{}'", addr)))?;

        let sentinel = Self::new(host, port);
        sentinel.validate()?;
        Ok(sentinel)
    }

    /// Dial address, "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidSentinel("empty host".into()));
        }
        if self.port == 0 {
            return Err(Error::InvalidSentinel(format!(
                "port must be positive for host '{}'",
                self.host
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Address of a monitored Redis instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
