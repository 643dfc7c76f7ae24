pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod redis;
pub mod sentinel;
pub mod topology;
pub mod watcher;

pub use error::{Error, Result};
pub use sentinel::{Manager, Sentinel, SentinelClient, SentinelEvent};
pub use topology::TopologyManager;
pub use watcher::Watcher;
