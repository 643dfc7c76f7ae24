//! Redis Sentinel Client
//!
//! Watches Sentinel processes over Pub/Sub and reports liveness and
//! failovers to a `Manager`.
//!
//! Features:
//! - One connection and subscription per Sentinel
//! - Edge-triggered `Added`/`Lost` liveness events
//! - `+switch-master` parsing into typed events
//! - Deterministic shutdown with no delivery after `close`
//! - Topology discovery via `SENTINEL MASTERS`

pub mod client;
pub mod events;
pub mod manager;
pub mod query;
pub mod types;

pub use client::{ClientOptions, Credentials, SentinelClient};
pub use events::{SentinelEvent, classify};
pub use manager::Manager;
pub use query::MasterDetails;
pub use types::{Address, Sentinel};
