//! Topology Manager
//!
//! Aggregates events from every Sentinel client into a view of which
//! Sentinels are reachable and where each master currently lives.

use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

use crate::sentinel::query::MasterDetails;
use crate::sentinel::{Address, Manager, Sentinel, SentinelEvent};

// =============================================================================
// State Queries
// =============================================================================

/// Request for a topology snapshot; answered through `reply`
#[derive(Debug)]
pub struct TopologyRequest {
    pub reply: oneshot::Sender<TopologyState>,
}

impl TopologyRequest {
    pub fn channel() -> (Self, oneshot::Receiver<TopologyState>) {
        let (reply, rx) = oneshot::channel();
        (Self { reply }, rx)
    }
}

/// Snapshot of the topology, sorted by Sentinel and master name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyState {
    pub sentinels: Vec<(Sentinel, SentinelStatus)>,
    pub masters: Vec<(String, Address)>,
}

impl TopologyState {
    pub fn master(&self, name: &str) -> Option<&Address> {
        self.masters
            .iter()
            .find(|(master, _)| master == name)
            .map(|(_, address)| address)
    }

    pub fn online_count(&self) -> usize {
        self.sentinels
            .iter()
            .filter(|(_, status)| status.link == LinkStatus::Online)
            .count()
    }
}

// =============================================================================
// Sentinel Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Online,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentinelStatus {
    pub link: LinkStatus,
    /// Replies seen since the manager started
    pub pings: u64,
    /// Unix time of the last event, in milliseconds
    pub last_seen_ms: u64,
}

impl SentinelStatus {
    fn online() -> Self {
        Self {
            link: LinkStatus::Online,
            pings: 0,
            last_seen_ms: current_time_ms(),
        }
    }
}

// =============================================================================
// Manager
// =============================================================================

#[derive(Debug, Default)]
pub struct TopologyManager {
    sentinels: DashMap<Sentinel, SentinelStatus>,
    masters: DashMap<String, Address>,
}

impl TopologyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record masters found by discovery. Addresses already learned from
    /// `+switch-master` are overwritten, discovery being the more recent.
    pub fn seed_masters(&self, masters: &[MasterDetails]) {
        for master in masters {
            let previous = self
                .masters
                .insert(master.name.clone(), master.address.clone());
            if master.is_down() {
                log::warn!(
                    "Master {} at {} is down ({})",
                    master.name,
                    master.address,
                    master.flags.join(",")
                );
            } else if previous.as_ref() != Some(&master.address) {
                log::info!("Master {} at {}", master.name, master.address);
            }
        }
    }

    pub fn master_address(&self, name: &str) -> Option<Address> {
        self.masters.get(name).map(|entry| entry.value().clone())
    }

    pub fn status(&self, sentinel: &Sentinel) -> Option<SentinelStatus> {
        self.sentinels.get(sentinel).map(|entry| *entry.value())
    }

    pub fn online_count(&self) -> usize {
        self.sentinels
            .iter()
            .filter(|entry| entry.value().link == LinkStatus::Online)
            .count()
    }

    pub fn snapshot(&self) -> TopologyState {
        let mut sentinels: Vec<_> = self
            .sentinels
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        sentinels.sort_by(|a, b| a.0.cmp(&b.0));

        let mut masters: Vec<_> = self
            .masters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        masters.sort();

        TopologyState { sentinels, masters }
    }

    fn touch(&self, sentinel: &Sentinel) {
        let mut status = self
            .sentinels
            .entry(sentinel.clone())
            .or_insert_with(SentinelStatus::online);
        status.pings += 1;
        status.last_seen_ms = current_time_ms();
    }

    fn switch_master(&self, sentinel: &Sentinel, name: &str, old: &Address, new: &Address) {
        self.touch(sentinel);

        // Every Sentinel announces the same failover
        let previous = self.masters.insert(name.to_string(), new.clone());
        if previous.as_ref() == Some(new) {
            return;
        }

        log::warn!(
            "Master {} switched from {} to {} (reported by sentinel {})",
            name,
            old,
            new,
            sentinel
        );
    }
}

impl Manager for TopologyManager {
    fn notify(&self, event: SentinelEvent) {
        match event {
            SentinelEvent::Added { sentinel } => {
                log::info!("Sentinel {} is online", sentinel);
                self.sentinels.insert(sentinel, SentinelStatus::online());
            }
            SentinelEvent::Lost { sentinel } => {
                log::warn!("Sentinel {} lost", sentinel);
                let mut status = self
                    .sentinels
                    .entry(sentinel)
                    .or_insert_with(SentinelStatus::online);
                status.link = LinkStatus::Lost;
            }
            SentinelEvent::Ping { sentinel } => self.touch(&sentinel),
            SentinelEvent::MasterSwitched {
                sentinel,
                master_name,
                old_address,
                new_address,
            } => self.switch_master(&sentinel, &master_name, &old_address, &new_address),
        }
    }

    fn get_state(&self, request: TopologyRequest) {
        // Requester may have gone away
        let _ = request.reply.send(self.snapshot());
    }
}

/// Get current time in milliseconds since UNIX epoch
#[inline]
fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
