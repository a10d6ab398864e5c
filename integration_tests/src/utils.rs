#![allow(dead_code)]
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use printcan_common::{
    config::{DisplayConfig, NodeConfig},
    constants::{object_ids, sub, values},
    nmt::NmtState,
    NetworkError, NodeId,
};
use printcan_node::{NodeContext, PrinterNode, StackEvent};

use crate::sim_printer::SimPrinter;
use crate::sim_stack::{Exchange, SimStack};

pub const PRINTER_ID: u8 = 1;
pub const DISPLAY_ID: u8 = 2;
pub const HOST_ID: u8 = 0x10;

/// Time advanced by one [`SimNetwork::step`]
pub const STEP_MS: u64 = 10;

pub fn node_id(id: u8) -> NodeId {
    NodeId::new(id).unwrap()
}

/// A printer with a display and a file host
pub fn full_config() -> NodeConfig {
    NodeConfig {
        display: Some(DisplayConfig {
            node_id: DISPLAY_ID,
            heartbeat_slot: 1,
        }),
        canfile_host: Some(HOST_ID),
        ..NodeConfig::new(PRINTER_ID)
    }
}

/// A host which serves a file in blocks
#[derive(Debug, Default)]
pub struct SimFileHost {
    pub file: Vec<u8>,
    /// Every block index written by the printer, including the end marker
    pub requests: Vec<u32>,
    /// Requested blocks not delivered yet
    pending: VecDeque<u32>,
    /// Blocks which get lost the first time they are sent
    pub lose_once: BTreeSet<u32>,
    pub closes: usize,
}

impl SimFileHost {
    pub fn new(file: Vec<u8>) -> Self {
        Self {
            file,
            ..Default::default()
        }
    }

    fn on_index(&mut self, index: u32) {
        self.requests.push(index);
        if index == values::END_OF_TRANSFER {
            self.closes += 1;
            self.pending.clear();
        } else {
            self.pending.push_back(index);
        }
    }

    fn next_block(&mut self) -> Option<Vec<u8>> {
        loop {
            let index = self.pending.pop_front()?;
            if self.lose_once.remove(&index) {
                continue;
            }
            let start = (index as usize * values::BLOCK_SIZE).min(self.file.len());
            let end = (start + values::BLOCK_SIZE).min(self.file.len());
            return Some(self.file[start..end].to_vec());
        }
    }
}

/// What the display received
#[derive(Debug, Default)]
pub struct SimDisplay {
    pub notifications: Vec<u16>,
    pub file_records: Vec<Vec<u8>>,
}

/// A bus with a printer node, its display and a file host
///
/// The node itself is kept by the test and passed to each call, so tests can inspect it freely.
#[derive(Debug)]
pub struct SimNetwork {
    pub stack: SimStack,
    pub printer: SimPrinter,
    pub host: SimFileHost,
    pub display: SimDisplay,
    /// Producer heartbeat time each peer answers with
    pub heartbeat_times: BTreeMap<NodeId, u16>,
    /// Deliver requested blocks before the request exchange is confirmed
    pub host_replies_early: bool,
    pub now_ms: u64,
    observed: usize,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self {
            stack: SimStack::new(),
            printer: SimPrinter::new(),
            host: SimFileHost::default(),
            display: SimDisplay::default(),
            heartbeat_times: BTreeMap::new(),
            host_replies_early: false,
            now_ms: 0,
            observed: 0,
        }
    }

    /// Create and initialize a node
    pub fn start_node(&mut self, config: &NodeConfig) -> PrinterNode {
        let mut node = PrinterNode::new(config).unwrap();
        node.init(&mut self.stack);
        node
    }

    pub fn event(&mut self, node: &mut PrinterNode, event: StackEvent<'_>) {
        let mut ctx = NodeContext::new(&mut self.stack, &mut self.printer, self.now_ms);
        node.handle_event(event, &mut ctx);
    }

    /// A remote write to the printer's dictionary
    pub fn write(&mut self, node: &mut PrinterNode, index: u16, sub: u8, data: &[u8]) {
        let mut ctx = NodeContext::new(&mut self.stack, &mut self.printer, self.now_ms);
        assert_eq!(
            values::OD_SUCCESSFUL,
            node.on_write(index, sub, data, &mut ctx)
        );
    }

    /// The display sends a command
    pub fn command(&mut self, node: &mut PrinterNode, index: u16, value: u16) {
        self.write(node, index, 0, &value.to_le_bytes());
    }

    /// The host starts a CANFILE transfer
    pub fn open_file(&mut self, node: &mut PrinterNode, file: Vec<u8>) {
        let size = file.len() as u32;
        self.host.file = file;
        self.write(
            node,
            object_ids::CANFILE,
            sub::canfile::SIZE,
            &size.to_le_bytes(),
        );
    }

    /// A peer boots and becomes operational
    pub fn boot_peer(&mut self, node: &mut PrinterNode, peer: u8) {
        self.event(node, StackEvent::PeerBootup(node_id(peer)));
        self.step(node);
        self.event(
            node,
            StackEvent::PeerStateChanged(node_id(peer), NmtState::Operational),
        );
    }

    /// Advance time by one step
    ///
    /// Completes every exchange in flight, lets the host answer block requests and runs the
    /// node's periodic process.
    pub fn step(&mut self, node: &mut PrinterNode) {
        self.now_ms += STEP_MS;
        self.observe();
        if self.host_replies_early {
            self.deliver_blocks(node);
        }

        let count = self.stack.in_flight.len();
        for _ in 0..count {
            let Some(exchange) = self.stack.next_exchange() else {
                break;
            };
            self.complete(node, exchange);
        }
        self.observe();
        if !self.host_replies_early {
            self.deliver_blocks(node);
        }

        let mut ctx = NodeContext::new(&mut self.stack, &mut self.printer, self.now_ms);
        node.process(&mut ctx);
    }

    pub fn run(&mut self, node: &mut PrinterNode, steps: usize) {
        for _ in 0..steps {
            self.step(node);
        }
    }

    /// Let the print task read every byte which is ready
    pub fn read_file(&mut self, node: &mut PrinterNode) -> Vec<u8> {
        let mut ctx = NodeContext::new(&mut self.stack, &mut self.printer, self.now_ms);
        let mut out = Vec::new();
        while let Some(b) = node.read_file_byte(&mut ctx) {
            out.push(b);
        }
        out
    }

    /// Read a whole CANFILE job, failing after `max_steps`
    pub fn read_whole_file(&mut self, node: &mut PrinterNode, max_steps: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..max_steps {
            self.step(node);
            out.extend(self.read_file(node));
            if node.canfile().unwrap().eof() {
                return out;
            }
        }
        panic!(
            "File not complete after {max_steps} steps, got {} bytes",
            out.len()
        );
    }

    /// Pass new exchanges to the peers they were sent to
    fn observe(&mut self) {
        let new: Vec<Exchange> = self.stack.history[self.observed..].to_vec();
        self.observed = self.stack.history.len();
        for exchange in new {
            if exchange.is_read {
                continue;
            }
            match (exchange.peer.raw(), exchange.index) {
                (HOST_ID, object_ids::CANFILE_BLOCK_ID) => self.host.on_index(exchange.u32()),
                (DISPLAY_ID, object_ids::NOTIFY_OUTPUT) => {
                    self.display.notifications.push(exchange.u16())
                }
                (DISPLAY_ID, object_ids::FILE_BUFFER) => {
                    self.display.file_records.push(exchange.data.clone())
                }
                _ => (),
            }
        }
    }

    fn complete(&mut self, node: &mut PrinterNode, exchange: Exchange) {
        let data = if exchange.is_read {
            match self.heartbeat_times.get(&exchange.peer) {
                Some(ms) => Ok(ms.to_le_bytes().to_vec()),
                None => Err(NetworkError::PeerTimeout),
            }
        } else {
            Ok(Vec::new())
        };
        let event = StackEvent::SdoFinished {
            peer: exchange.peer,
            completion: exchange.completion,
            result: data.as_ref().map(|d| d.as_slice()).map_err(|e| *e),
        };
        let mut ctx = NodeContext::new(&mut self.stack, &mut self.printer, self.now_ms);
        node.handle_event(event, &mut ctx);
    }

    fn deliver_blocks(&mut self, node: &mut PrinterNode) {
        while let Some(block) = self.host.next_block() {
            self.write(node, object_ids::CANFILE, sub::canfile::BUFFER, &block);
        }
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimNetwork {
    pub fn print_history(&self) {
        println!("Exchange history");
        println!("----------------");
        for e in &self.stack.history {
            println!(
                "{} {:04x}sub{} {:?} {} {:02x?}",
                e.peer.raw(),
                e.index,
                e.sub,
                e.completion,
                if e.is_read { "read" } else { "write" },
                e.data
            );
        }
    }
}

impl Drop for SimNetwork {
    fn drop(&mut self) {
        // Only useful when a test failed
        if std::thread::panicking() {
            self.print_history();
        }
    }
}
