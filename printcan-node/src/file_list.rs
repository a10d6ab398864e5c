//! Sending the media directory listing to the display
//!
//! A listing is a chain of records written to the display's file buffer entry, each one sent when
//! the previous exchange finishes:
//!
//! - `'<'` count:u16 at_root:u8
//! - `'*'` index:u16 is_dir:u8 size:u32 timestamp:u32 name NUL, once per entry
//! - `'>'`
//!
//! A lone `':'` name NUL record reports the current file name. Numbers are little endian.
use defmt_or_log::{debug, warn};
use heapless::Vec;
use printcan_common::{constants::object_ids, NodeId};

use crate::printer::{MediaEntry, MediaLibrary};
use crate::stack::{Completion, NetworkStack};

/// Largest record sent
pub const RECORD_SIZE: usize = 256;

const HEADER: u8 = b'<';
const ENTRY: u8 = b'*';
const FOOTER: u8 = b'>';
const FILENAME: u8 = b':';

type Record = Vec<u8, RECORD_SIZE>;

#[derive(Debug)]
struct Pending {
    record: Record,
    completion: Completion,
    block_mode: bool,
}

/// Append a NUL terminated name, truncated to fit in the record
fn push_name(record: &mut Record, name: &str) {
    let room = RECORD_SIZE - record.len() - 1;
    let bytes = name.as_bytes();
    let len = bytes.len().min(room);
    record.extend_from_slice(&bytes[..len]).ok();
    record.push(0).ok();
}

fn header_record(count: u16, at_root: bool) -> Record {
    let mut record = Record::new();
    record.push(HEADER).ok();
    record.extend_from_slice(&count.to_le_bytes()).ok();
    record.push(at_root as u8).ok();
    record
}

fn entry_record(entry: &MediaEntry<'_>) -> Record {
    let mut record = Record::new();
    record.push(ENTRY).ok();
    record.extend_from_slice(&entry.index.to_le_bytes()).ok();
    record.push(entry.is_dir as u8).ok();
    record.extend_from_slice(&entry.size.to_le_bytes()).ok();
    record.extend_from_slice(&entry.timestamp.to_le_bytes()).ok();
    push_name(&mut record, entry.name);
    record
}

fn footer_record() -> Record {
    let mut record = Record::new();
    record.push(FOOTER).ok();
    record
}

fn filename_record(name: &str) -> Record {
    let mut record = Record::new();
    record.push(FILENAME).ok();
    push_name(&mut record, name);
    record
}

/// Sends listings to the display
#[derive(Debug)]
pub struct FileListSender {
    display: NodeId,
    /// Next entry of the listing in progress
    next: Option<u16>,
    count: u16,
    /// Refused record of the listing in progress
    pending_list: Option<Pending>,
    /// Refused current file name record
    pending_name: Option<Pending>,
}

impl FileListSender {
    /// Create a sender for `display`
    pub const fn new(display: NodeId) -> Self {
        Self {
            display,
            next: None,
            count: 0,
            pending_list: None,
            pending_name: None,
        }
    }

    /// True while a listing is being sent
    pub fn in_progress(&self) -> bool {
        self.next.is_some()
    }

    /// True if a refused record waits to be sent
    pub fn has_pending(&self) -> bool {
        self.pending_list.is_some() || self.pending_name.is_some()
    }

    /// Write a record, returning it to the caller if the stack refused it
    fn send(
        &self,
        record: Record,
        completion: Completion,
        block_mode: bool,
        stack: &mut dyn NetworkStack,
    ) -> Option<Pending> {
        match stack.write_remote(
            self.display,
            object_ids::FILE_BUFFER,
            0,
            &record,
            completion,
            block_mode,
        ) {
            Ok(()) => None,
            Err(e) => {
                debug!("File list record cached: {:?}", e);
                Some(Pending {
                    record,
                    completion,
                    block_mode,
                })
            }
        }
    }

    fn send_list_record(
        &mut self,
        record: Record,
        completion: Completion,
        block_mode: bool,
        stack: &mut dyn NetworkStack,
    ) {
        self.pending_list = self.send(record, completion, block_mode, stack);
    }

    /// Re-read the working directory and start sending its listing
    pub fn send_listing(&mut self, media: &mut dyn MediaLibrary, stack: &mut dyn NetworkStack) {
        media.refresh();
        self.count = media.count();
        self.next = Some(0);
        debug!("Sending file list, {} entries", self.count);
        // Records of a listing that was still going out are superseded
        let record = header_record(self.count, media.is_at_root());
        self.send_list_record(record, Completion::FileList, false, stack);
    }

    /// Send the name of the current file
    pub fn send_filename(&mut self, media: &mut dyn MediaLibrary, stack: &mut dyn NetworkStack) {
        let record = filename_record(media.current_filename());
        self.pending_name = self.send(record, Completion::Flush, true, stack);
    }

    /// Send the next record of the listing in progress
    ///
    /// Called when the exchange for the previous record finished. A refused record of the listing
    /// goes out first, so records always leave in order.
    pub fn send_next(&mut self, media: &mut dyn MediaLibrary, stack: &mut dyn NetworkStack) {
        if let Some(pending) = self.pending_list.take() {
            self.send_list_record(
                pending.record,
                pending.completion,
                pending.block_mode,
                stack,
            );
            return;
        }
        let Some(index) = self.next else {
            return;
        };
        let entry = if index < self.count {
            media.entry(index).map(|e| entry_record(&e))
        } else {
            None
        };
        match entry {
            Some(record) => {
                self.next = Some(index + 1);
                self.send_list_record(record, Completion::FileList, true, stack);
            }
            None => {
                if index < self.count {
                    warn!("File list entry {} vanished, ending list", index);
                }
                self.next = None;
                debug!("File list done");
                self.send_list_record(footer_record(), Completion::Flush, false, stack);
            }
        }
    }

    /// Try to send a refused record again
    ///
    /// Listing records go before the file name. Returns true if there was one.
    pub fn retry(&mut self, stack: &mut dyn NetworkStack) -> bool {
        if let Some(pending) = self.pending_list.take() {
            self.send_list_record(
                pending.record,
                pending.completion,
                pending.block_mode,
                stack,
            );
        } else if let Some(pending) = self.pending_name.take() {
            self.pending_name =
                self.send(
                    pending.record,
                    pending.completion,
                    pending.block_mode,
                    stack,
                );
        } else {
            return false;
        }
        true
    }
}
