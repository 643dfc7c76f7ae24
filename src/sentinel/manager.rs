use super::events::SentinelEvent;
use crate::topology::TopologyRequest;

/// Consumer of Sentinel events.
///
/// `notify` is called from a client's receive loop and must return quickly;
/// buffering or fan-out is the implementor's business.
pub trait Manager: Send + Sync {
    fn notify(&self, event: SentinelEvent);

    fn get_state(&self, request: TopologyRequest);
}
