//! Test doubles for the network stack and the printer
use std::collections::BTreeMap;
use std::vec::Vec;

use printcan_common::{NetworkError, NodeId};

use crate::printer::{
    DeviceAction, DisplaySnapshot, MediaEntry, MediaLibrary, PowerLossRecovery, PrintJobTimer,
    Printer, PrinterSnapshot,
};
use crate::stack::{Completion, NetworkStack};

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteWrite {
    pub peer: NodeId,
    pub index: u16,
    pub sub: u8,
    pub data: Vec<u8>,
    pub completion: Completion,
    pub block_mode: bool,
}

impl RemoteWrite {
    pub fn u32(&self) -> u32 {
        u32::from_le_bytes(self.data[..4].try_into().unwrap())
    }

    pub fn u16(&self) -> u16 {
        u16::from_le_bytes(self.data[..2].try_into().unwrap())
    }
}

#[derive(Debug, Default)]
pub struct MockStack {
    pub remote_writes: Vec<RemoteWrite>,
    pub remote_reads: Vec<(NodeId, u16, u8, Completion)>,
    pub line_resets: Vec<NodeId>,
    pub pdos: BTreeMap<u8, bool>,
    pub consumer_heartbeat: BTreeMap<u8, (NodeId, u16)>,
    pub local: BTreeMap<(u16, u8), Vec<u8>>,
    pub observers: Vec<(u16, u8)>,
    /// Number of upcoming remote writes to reject
    pub reject_writes: usize,
}

impl MockStack {
    pub fn pdo(&self, pdo: u8) -> bool {
        self.pdos.get(&pdo).copied().unwrap_or(false)
    }

    pub fn local_u8(&self, index: u16, sub: u8) -> u8 {
        self.local[&(index, sub)][0]
    }

    pub fn local_u16(&self, index: u16, sub: u8) -> u16 {
        u16::from_le_bytes(self.local[&(index, sub)][..2].try_into().unwrap())
    }

    pub fn local_f32(&self, index: u16, sub: u8) -> f32 {
        f32::from_le_bytes(self.local[&(index, sub)][..4].try_into().unwrap())
    }

    pub fn take_writes(&mut self) -> Vec<RemoteWrite> {
        core::mem::take(&mut self.remote_writes)
    }
}

impl NetworkStack for MockStack {
    fn write_remote(
        &mut self,
        peer: NodeId,
        index: u16,
        sub: u8,
        data: &[u8],
        completion: Completion,
        block_mode: bool,
    ) -> Result<(), NetworkError> {
        if self.reject_writes > 0 {
            self.reject_writes -= 1;
            return Err(NetworkError::TransportFull);
        }
        self.remote_writes.push(RemoteWrite {
            peer,
            index,
            sub,
            data: data.to_vec(),
            completion,
            block_mode,
        });
        Ok(())
    }

    fn read_remote(
        &mut self,
        peer: NodeId,
        index: u16,
        sub: u8,
        completion: Completion,
    ) -> Result<(), NetworkError> {
        self.remote_reads.push((peer, index, sub, completion));
        Ok(())
    }

    fn reset_client_line(&mut self, peer: NodeId) {
        self.line_resets.push(peer);
    }

    fn set_pdo_enabled(&mut self, pdo: u8, enabled: bool) {
        self.pdos.insert(pdo, enabled);
    }

    fn set_consumer_heartbeat(&mut self, slot: u8, peer: NodeId, timeout_ms: u16) -> bool {
        if slot >= 4 {
            return false;
        }
        self.consumer_heartbeat.insert(slot, (peer, timeout_ms));
        true
    }

    fn write_local(&mut self, index: u16, sub: u8, data: &[u8]) {
        self.local.insert((index, sub), data.to_vec());
    }

    fn register_write_observer(&mut self, index: u16, sub: u8) {
        self.observers.push((index, sub));
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockEntry {
    pub name: &'static str,
    pub is_dir: bool,
    pub size: u32,
}

#[derive(Debug, Default)]
pub struct MockMedia {
    pub entries: Vec<MockEntry>,
    pub at_root: bool,
    pub refreshes: usize,
    pub up_dirs: usize,
    pub entered: Vec<u16>,
    pub printed: Vec<u16>,
    pub current: &'static str,
}

impl MediaLibrary for MockMedia {
    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    fn is_at_root(&self) -> bool {
        self.at_root
    }

    fn up_dir(&mut self) {
        self.up_dirs += 1;
    }

    fn entry(&mut self, index: u16) -> Option<MediaEntry<'_>> {
        self.entries.get(index as usize).map(|e| MediaEntry {
            index,
            is_dir: e.is_dir,
            size: e.size,
            timestamp: 0x6000_0000 + index as u32,
            name: e.name,
        })
    }

    fn change_dir(&mut self, index: u16) {
        self.entered.push(index);
    }

    fn print(&mut self, index: u16) {
        self.printed.push(index);
    }

    fn current_filename(&self) -> &str {
        self.current
    }
}

#[derive(Debug, Default)]
pub struct MockPrinter {
    pub snapshot: PrinterSnapshot,
    pub display: DisplaySnapshot,
    pub actions: Vec<DeviceAction>,
    pub filament_present: bool,
    pub target_too_cold: bool,
    pub too_cold: bool,
    pub resume_position: Option<u32>,
    pub canfile_opened: Vec<bool>,
    pub timer_starts: usize,
    pub timer_pauses: usize,
    pub media: Option<MockMedia>,
}

impl PrintJobTimer for MockPrinter {
    fn start_job_timer(&mut self) {
        self.timer_starts += 1;
    }

    fn pause_job_timer(&mut self) {
        self.timer_pauses += 1;
    }
}

impl PowerLossRecovery for MockPrinter {
    fn resume_position(&self) -> Option<u32> {
        self.resume_position
    }

    fn canfile_opened(&mut self, opened: bool) {
        self.canfile_opened.push(opened);
    }
}

impl Printer for MockPrinter {
    fn snapshot(&self) -> PrinterSnapshot {
        self.snapshot
    }

    fn display_snapshot(&self) -> DisplaySnapshot {
        self.display
    }

    fn perform(&mut self, action: DeviceAction) {
        self.actions.push(action);
    }

    fn filament_present(&self) -> bool {
        self.filament_present
    }

    fn target_too_cold_to_extrude(&self) -> bool {
        self.target_too_cold
    }

    fn too_cold_to_extrude(&self) -> bool {
        self.too_cold
    }

    fn media(&mut self) -> Option<&mut dyn MediaLibrary> {
        self.media.as_mut().map(|m| m as &mut dyn MediaLibrary)
    }
}
