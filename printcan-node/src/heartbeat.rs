//! Peer liveness tracking
//!
//! When a peer boots, its producer heartbeat time is read and one and a half times that value is
//! stored as the consumer heartbeat timeout for the peer. The stack then reports state changes and
//! missed heartbeats, which are tracked per peer. The global status PDO only runs while at least
//! one peer is operational.
use defmt_or_log::{debug, info, warn};
use heapless::Vec;
use printcan_common::{
    constants::{object_ids, values},
    NetworkError, NodeId,
};

use crate::stack::{Completion, NetworkStack};

/// Maximum number of peers tracked
pub const MAX_PEERS: usize = 8;

/// What is known about one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerState {
    /// The peer's node ID
    pub node_id: NodeId,
    /// Consumer heartbeat timeout, 0 until the peer's heartbeat time has been read
    pub heartbeat_timeout_ms: u16,
    /// Last reported liveness
    pub is_operational: bool,
    /// Entry of the consumer heartbeat table reserved for this peer
    pub heartbeat_slot: Option<u8>,
}

impl PeerState {
    fn new(node_id: NodeId, heartbeat_slot: Option<u8>) -> Self {
        Self {
            node_id,
            heartbeat_timeout_ms: 0,
            is_operational: false,
            heartbeat_slot,
        }
    }
}

/// Compute the consumer timeout for a producer heartbeat time
///
/// The result is 1.5 times the producer time, saturated to the 16-bit range.
pub fn consumer_timeout_ms(producer_ms: u16) -> u16 {
    let t = producer_ms as u32 * 3 / 2;
    t.min(u16::MAX as u32) as u16
}

/// Tracks the liveness of the peers on the bus
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    peers: Vec<PeerState, MAX_PEERS>,
    operational_count: u8,
    broadcast_enabled: bool,
}

impl HeartbeatMonitor {
    /// Create an empty monitor
    pub const fn new() -> Self {
        Self {
            peers: Vec::new(),
            operational_count: 0,
            broadcast_enabled: false,
        }
    }

    /// Add a known peer, with the consumer heartbeat slot reserved for it
    ///
    /// Returns false if the peer table is full. Adding a peer twice updates its slot.
    pub fn add_peer(&mut self, node_id: NodeId, heartbeat_slot: Option<u8>) -> bool {
        if let Some(peer) = self.peer_mut(node_id) {
            peer.heartbeat_slot = heartbeat_slot;
            return true;
        }
        self.peers
            .push(PeerState::new(node_id, heartbeat_slot))
            .is_ok()
    }

    /// Get the state of a peer
    pub fn peer(&self, node_id: NodeId) -> Option<&PeerState> {
        self.peers.iter().find(|p| p.node_id == node_id)
    }

    fn peer_mut(&mut self, node_id: NodeId) -> Option<&mut PeerState> {
        self.peers.iter_mut().find(|p| p.node_id == node_id)
    }

    fn peer_or_insert(&mut self, node_id: NodeId) -> Option<&mut PeerState> {
        if self.peer(node_id).is_none() && self.peers.push(PeerState::new(node_id, None)).is_err()
        {
            warn!("Peer table full, not tracking node {}", node_id.raw());
            return None;
        }
        self.peer_mut(node_id)
    }

    /// All tracked peers
    pub fn peers(&self) -> &[PeerState] {
        &self.peers
    }

    /// Number of peers currently operational
    pub fn operational_count(&self) -> u8 {
        self.operational_count
    }

    /// True if the global status PDO is currently enabled
    pub fn broadcast_enabled(&self) -> bool {
        self.broadcast_enabled
    }

    /// Handle a boot-up message from a peer
    ///
    /// Abandons any SDO exchange with the peer and reads its producer heartbeat time. The result
    /// comes back as an SDO completion with [`Completion::HeartbeatTime`].
    pub fn on_bootup(&mut self, peer: NodeId, stack: &mut dyn NetworkStack) {
        info!("Node {} booted", peer.raw());
        self.peer_or_insert(peer);
        stack.reset_client_line(peer);
        if let Err(e) = stack.read_remote(
            peer,
            object_ids::HEARTBEAT_PRODUCER_TIME,
            0,
            Completion::HeartbeatTime,
        ) {
            warn!(
                "Failed to read heartbeat time of node {}: {:?}",
                peer.raw(),
                e
            );
        }
    }

    /// Handle the result of a heartbeat time read
    ///
    /// Returns false if the read failed, in which case the caller should treat the exchange as
    /// finished and flush the peer.
    pub fn on_heartbeat_time(
        &mut self,
        peer: NodeId,
        result: Result<&[u8], NetworkError>,
        stack: &mut dyn NetworkStack,
    ) -> bool {
        let producer_ms = match result {
            Ok(&[lo, hi, ..]) => u16::from_le_bytes([lo, hi]),
            Ok(data) => {
                warn!(
                    "Short heartbeat time from node {}: {} bytes",
                    peer.raw(),
                    data.len()
                );
                return false;
            }
            Err(e) => {
                warn!(
                    "Failed to read heartbeat time of node {}: {:?}",
                    peer.raw(),
                    e
                );
                return false;
            }
        };

        let timeout = consumer_timeout_ms(producer_ms);
        debug!("Node {} heartbeat timeout is {} ms", peer.raw(), timeout);
        if let Some(state) = self.peer_or_insert(peer) {
            state.heartbeat_timeout_ms = timeout;
            if timeout != 0 {
                if let Some(slot) = state.heartbeat_slot {
                    if !stack.set_consumer_heartbeat(slot, peer, timeout) {
                        warn!(
                            "No consumer heartbeat slot {} for node {}",
                            slot,
                            peer.raw()
                        );
                    }
                }
            }
        }
        stack.reset_client_line(peer);
        true
    }

    /// Record a peer's liveness
    ///
    /// Returns `Some(operational)` if the peer's liveness changed, and `None` if it is unchanged
    /// or the peer could not be tracked.
    pub fn set_operational(&mut self, peer: NodeId, operational: bool) -> Option<bool> {
        let state = self.peer_or_insert(peer)?;
        if state.is_operational == operational {
            return None;
        }
        state.is_operational = operational;
        if operational {
            info!("Node {} is operational", peer.raw());
            self.operational_count += 1;
        } else {
            info!("Node {} left", peer.raw());
            self.operational_count = self.operational_count.saturating_sub(1);
        }
        Some(operational)
    }

    /// Enable the global status PDO while any peer is operational, disable it otherwise
    ///
    /// The stack is only touched when the PDO actually needs to change.
    pub fn sync_broadcast(&mut self, stack: &mut dyn NetworkStack) {
        let wanted = self.operational_count > 0;
        if wanted != self.broadcast_enabled {
            debug!(
                "Global broadcast {}",
                if wanted { "enabled" } else { "disabled" }
            );
            stack.set_pdo_enabled(values::GLOBAL_PDO, wanted);
            self.broadcast_enabled = wanted;
        }
    }
}
