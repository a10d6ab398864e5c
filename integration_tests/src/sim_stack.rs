//! A simulated CANopen stack
//!
//! Models one SDO client line per peer: an exchange started with a peer occupies its line until
//! the exchange is completed by the simulation, or the node resets the line. Starting a second
//! exchange on a busy line fails with [`NetworkError::TransportFull`], like the real stack.
use std::collections::{BTreeMap, VecDeque};

use printcan_common::{NetworkError, NodeId};
use printcan_node::{Completion, NetworkStack};

/// An SDO exchange started by the node
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub peer: NodeId,
    pub index: u16,
    pub sub: u8,
    /// Written data, empty for reads
    pub data: Vec<u8>,
    pub completion: Completion,
    pub block_mode: bool,
    pub is_read: bool,
}

impl Exchange {
    pub fn u16(&self) -> u16 {
        u16::from_le_bytes([self.data[0], self.data[1]])
    }

    pub fn u32(&self) -> u32 {
        u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }
}

#[derive(Debug, Default)]
pub struct SimStack {
    /// Exchanges in flight, oldest first
    pub in_flight: VecDeque<Exchange>,
    /// Every exchange which was started
    pub history: Vec<Exchange>,
    /// Number of exchanges refused because the line was busy
    pub refused: usize,
    /// Refuse this many upcoming exchanges regardless of the line state
    pub reject_next: usize,
    pub line_resets: Vec<NodeId>,
    pub pdos: BTreeMap<u8, bool>,
    pub consumer_heartbeat: BTreeMap<u8, (NodeId, u16)>,
    pub dictionary: BTreeMap<(u16, u8), Vec<u8>>,
    pub observers: Vec<(u16, u8)>,
}

impl SimStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_busy(&self, peer: NodeId) -> bool {
        self.in_flight.iter().any(|e| e.peer == peer)
    }

    pub fn pdo_enabled(&self, pdo: u8) -> bool {
        self.pdos.get(&pdo).copied().unwrap_or(false)
    }

    pub fn local(&self, index: u16, sub: u8) -> Option<&[u8]> {
        self.dictionary.get(&(index, sub)).map(|v| v.as_slice())
    }

    pub fn local_u8(&self, index: u16, sub: u8) -> u8 {
        self.local(index, sub).expect("entry not written")[0]
    }

    pub fn local_u16(&self, index: u16, sub: u8) -> u16 {
        let data = self.local(index, sub).expect("entry not written");
        u16::from_le_bytes([data[0], data[1]])
    }

    /// Remove and return the oldest exchange in flight
    pub fn next_exchange(&mut self) -> Option<Exchange> {
        self.in_flight.pop_front()
    }

    /// Exchanges started with `peer` on object `index`
    pub fn sent_to(&self, peer: NodeId, index: u16) -> impl Iterator<Item = &Exchange> {
        self.history
            .iter()
            .filter(move |e| e.peer == peer && e.index == index)
    }

    fn start(&mut self, exchange: Exchange) -> Result<(), NetworkError> {
        if self.reject_next > 0 {
            self.reject_next -= 1;
            self.refused += 1;
            return Err(NetworkError::TransportFull);
        }
        if self.line_busy(exchange.peer) {
            self.refused += 1;
            return Err(NetworkError::TransportFull);
        }
        self.history.push(exchange.clone());
        self.in_flight.push_back(exchange);
        Ok(())
    }
}

impl NetworkStack for SimStack {
    fn write_remote(
        &mut self,
        peer: NodeId,
        index: u16,
        sub: u8,
        data: &[u8],
        completion: Completion,
        block_mode: bool,
    ) -> Result<(), NetworkError> {
        self.start(Exchange {
            peer,
            index,
            sub,
            data: data.to_vec(),
            completion,
            block_mode,
            is_read: false,
        })
    }

    fn read_remote(
        &mut self,
        peer: NodeId,
        index: u16,
        sub: u8,
        completion: Completion,
    ) -> Result<(), NetworkError> {
        self.start(Exchange {
            peer,
            index,
            sub,
            data: Vec::new(),
            completion,
            block_mode: false,
            is_read: true,
        })
    }

    fn reset_client_line(&mut self, peer: NodeId) {
        self.line_resets.push(peer);
        self.in_flight.retain(|e| e.peer != peer);
    }

    fn set_pdo_enabled(&mut self, pdo: u8, enabled: bool) {
        self.pdos.insert(pdo, enabled);
    }

    fn set_consumer_heartbeat(&mut self, slot: u8, peer: NodeId, timeout_ms: u16) -> bool {
        if slot >= printcan_common::config::CONSUMER_HEARTBEAT_SLOTS {
            return false;
        }
        self.consumer_heartbeat.insert(slot, (peer, timeout_ms));
        true
    }

    fn write_local(&mut self, index: u16, sub: u8, data: &[u8]) {
        self.dictionary.insert((index, sub), data.to_vec());
    }

    fn register_write_observer(&mut self, index: u16, sub: u8) {
        self.observers.push((index, sub));
    }
}
