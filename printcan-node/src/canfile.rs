//! CANFILE: streaming a print file from the file host, one block at a time
//!
//! The host writes the file size to the CANFILE record to start a job. The node then asks for
//! blocks by writing a block index to the host, and the host answers by writing the block data back
//! to the CANFILE record. Only one request is ever in flight. Received blocks go into a ring of
//! [`BLOCK_COUNT`] slots of [`BLOCK_SIZE`] bytes, which the print task drains with
//! [`CanFile::get`]. A slot is requested again only after the reader has consumed it.
//!
//! When the whole file has been received, or the job is aborted, the node writes
//! [`END_OF_TRANSFER`] as the block index to close the transfer.
//!
//! A request or close which the stack refuses is remembered, and sent again from
//! [`CanFile::flush_cached`] the next time an exchange with the host finishes. A request which gets
//! no answer before its deadline is sent again from [`CanFile::check_timeout`].
use defmt_or_log::{debug, info, warn};
use printcan_common::{
    constants::{
        object_ids,
        values::{BLOCK_COUNT, BLOCK_SIZE, END_OF_TRANSFER},
    },
    NodeId,
};

use crate::printer::PrintTask;
use crate::stack::{Completion, NetworkStack};

/// Size of the receive buffer
pub const BUFFER_SIZE: usize = BLOCK_SIZE * BLOCK_COUNT;

const VALID_MASK: u8 = (1 << BLOCK_COUNT) - 1;

/// State of the link to the file host
///
/// At most one message is outstanding or cached at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Nothing in flight and nothing to retry
    Quiet,
    /// A block request is in flight
    Awaiting {
        /// Time at which the request is considered lost
        deadline_ms: u64,
    },
    /// A block request was refused by the stack and waits for a flush
    RequestCached,
    /// A close is wanted, but a block request is still in flight
    CloseDeferred {
        /// Deadline of the request in flight
        deadline_ms: u64,
    },
    /// A close was refused by the stack and waits for a flush
    CloseCached,
}

impl LinkState {
    /// True while a block request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            LinkState::Awaiting { .. } | LinkState::CloseDeferred { .. }
        )
    }

    /// True while a refused message waits for a flush
    pub fn is_cached(&self) -> bool {
        matches!(self, LinkState::RequestCached | LinkState::CloseCached)
    }

    /// True while a close is pending
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            LinkState::CloseDeferred { .. } | LinkState::CloseCached
        )
    }
}

/// State of the print task consuming the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// No job
    Stopped,
    /// The job is being printed
    Printing,
    /// The job is open but paused
    Paused,
}

/// Receiver side of a CANFILE transfer
///
/// The `aborting` and `finishing` flags of the print task are independent of the link state: an
/// aborting task is normally closing the link at the same time.
pub struct CanFile {
    host: NodeId,
    request_timeout_ms: u32,
    link: LinkState,
    task: TaskState,
    aborting: bool,
    finishing: bool,
    opened: bool,
    size: u32,
    block_write: u32,
    block_read: u32,
    valid: u8,
    offset: u16,
    buffer: [[u8; BLOCK_SIZE]; BLOCK_COUNT],
}

impl core::fmt::Debug for CanFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CanFile")
            .field("host", &self.host)
            .field("link", &self.link)
            .field("task", &self.task)
            .field("opened", &self.opened)
            .field("size", &self.size)
            .field("block_write", &self.block_write)
            .field("block_read", &self.block_read)
            .field("valid", &self.valid)
            .field("offset", &self.offset)
            .finish()
    }
}

impl CanFile {
    /// Create an idle receiver for files served by `host`
    ///
    /// A block request is re-sent when no data arrived `request_timeout_ms` after it was sent.
    pub const fn new(host: NodeId, request_timeout_ms: u32) -> Self {
        Self {
            host,
            request_timeout_ms,
            link: LinkState::Quiet,
            task: TaskState::Stopped,
            aborting: false,
            finishing: false,
            opened: false,
            size: 0,
            block_write: 0,
            block_read: 0,
            valid: 0,
            offset: 0,
            buffer: [[0; BLOCK_SIZE]; BLOCK_COUNT],
        }
    }

    /// The file host
    pub fn host(&self) -> NodeId {
        self.host
    }

    /// Reset all transfer and task state in place
    pub fn clear(&mut self) {
        self.link = LinkState::Quiet;
        self.task = TaskState::Stopped;
        self.aborting = false;
        self.finishing = false;
        self.opened = false;
        self.size = 0;
        self.block_write = 0;
        self.block_read = 0;
        self.valid = 0;
        self.offset = 0;
        self.buffer = [[0; BLOCK_SIZE]; BLOCK_COUNT];
    }

    /// Start a new transfer of `size` bytes
    ///
    /// A size of 0 cancels: the state is cleared, the print task stopped, and power loss recovery
    /// told that no CANFILE job is open. Otherwise the transfer resumes at the position saved by
    /// power loss recovery, if any, the first block is requested and the print task started.
    ///
    /// Opening while a transfer is active restarts the transfer in place.
    pub fn open<T: PrintTask + ?Sized>(
        &mut self,
        size: u32,
        stack: &mut dyn NetworkStack,
        task: &mut T,
        now_ms: u64,
    ) {
        if self.is_open() || self.link != LinkState::Quiet {
            warn!("CANFILE opened while a transfer is active, restarting");
        }
        self.clear();
        info!("CANFILE open, size {}", size);

        if size == 0 {
            task.canfile_opened(false);
            self.task_stop();
            return;
        }

        self.size = size;
        if let Some(pos) = task.resume_position() {
            info!("CANFILE resuming at {}", pos);
            self.block_write = pos / BLOCK_SIZE as u32;
            self.block_read = self.block_write;
            self.offset = (pos % BUFFER_SIZE as u32) as u16;
        }
        self.request(stack, now_ms);
        task.canfile_opened(true);
        self.task_start(task);
    }

    /// Store a block received from the host
    ///
    /// Data arriving while no request is in flight is a duplicate or late reply and is dropped.
    pub fn receive_block(&mut self, data: &[u8], stack: &mut dyn NetworkStack, now_ms: u64) {
        if !self.link.is_busy() {
            debug!("CANFILE dropped unrequested block");
            return;
        }

        let slot = (self.block_write % BLOCK_COUNT as u32) as usize;
        let len = data.len().min(BLOCK_SIZE);
        let dest = &mut self.buffer[slot];
        dest[..len].copy_from_slice(&data[..len]);
        dest[len..].fill(0);
        debug!("CANFILE received block {}", self.block_write);

        self.valid |= 1 << slot;
        self.block_write += 1;
        self.opened = true;

        match self.link {
            LinkState::CloseDeferred { .. } => {
                self.link = LinkState::Quiet;
                self.send_close(stack);
            }
            _ => {
                self.link = LinkState::Quiet;
                self.advance(stack, now_ms);
            }
        }
    }

    /// Re-send a request which got no reply before its deadline
    pub fn check_timeout(&mut self, stack: &mut dyn NetworkStack, now_ms: u64) {
        match self.link {
            LinkState::Awaiting { deadline_ms } if now_ms >= deadline_ms => {
                warn!(
                    "CANFILE block {} timed out, requesting again",
                    self.block_write
                );
                self.link = LinkState::Quiet;
                self.advance(stack, now_ms);
            }
            LinkState::CloseDeferred { deadline_ms } if now_ms >= deadline_ms => {
                self.link = LinkState::Quiet;
                self.send_close(stack);
            }
            _ => (),
        }
    }

    /// True if a refused message waits to be sent again
    pub fn has_cache(&self) -> bool {
        self.link.is_cached()
    }

    /// Send a refused message again
    ///
    /// Returns true if there was one to send, whether or not it was accepted this time.
    pub fn flush_cached(&mut self, stack: &mut dyn NetworkStack, now_ms: u64) -> bool {
        match self.link {
            LinkState::RequestCached => {
                debug!("CANFILE retrying cached request");
                self.request(stack, now_ms);
                true
            }
            LinkState::CloseCached => {
                debug!("CANFILE retrying cached close");
                self.send_close(stack);
                true
            }
            _ => false,
        }
    }

    /// Close the transfer, or request the next block if a slot is free
    fn advance(&mut self, stack: &mut dyn NetworkStack, now_ms: u64) {
        if self.link.is_closing() {
            self.stop(stack);
        } else if self.transfer_complete() || self.valid != VALID_MASK {
            self.request(stack, now_ms);
        }
    }

    fn transfer_complete(&self) -> bool {
        self.block_write as u64 * BLOCK_SIZE as u64 >= self.size as u64
    }

    fn request(&mut self, stack: &mut dyn NetworkStack, now_ms: u64) {
        if self.link.is_busy() {
            return;
        }
        if self.transfer_complete() {
            if self.link == LinkState::RequestCached {
                self.link = LinkState::Quiet;
            }
            if self.opened {
                self.stop(stack);
            }
            return;
        }

        let block = self.block_write;
        match self.send_index(block, stack) {
            Ok(()) => {
                debug!("CANFILE requested block {}", block);
                self.link = LinkState::Awaiting {
                    deadline_ms: now_ms + self.request_timeout_ms as u64,
                };
            }
            Err(_) => {
                debug!("CANFILE request for block {} cached", block);
                self.link = LinkState::RequestCached;
            }
        }
    }

    /// End the transfer, waiting for the request in flight if there is one
    fn stop(&mut self, stack: &mut dyn NetworkStack) {
        match self.link {
            LinkState::Awaiting { deadline_ms } => {
                self.link = LinkState::CloseDeferred { deadline_ms };
            }
            LinkState::CloseDeferred { .. } => (),
            _ => self.send_close(stack),
        }
    }

    fn send_close(&mut self, stack: &mut dyn NetworkStack) {
        match self.send_index(END_OF_TRANSFER, stack) {
            Ok(()) => {
                if self.transfer_complete() {
                    info!("CANFILE transfer finished at block {}", self.block_write);
                } else {
                    info!("CANFILE transfer aborted at block {}", self.block_write);
                }
                self.link = LinkState::Quiet;
                self.opened = false;
            }
            Err(_) => {
                debug!("CANFILE close cached");
                self.link = LinkState::CloseCached;
            }
        }
    }

    fn send_index(
        &mut self,
        index: u32,
        stack: &mut dyn NetworkStack,
    ) -> Result<(), printcan_common::NetworkError> {
        stack.write_remote(
            self.host,
            object_ids::CANFILE_BLOCK_ID,
            0,
            &index.to_le_bytes(),
            Completion::Flush,
            false,
        )
    }

    fn current_slot(&self) -> usize {
        self.offset as usize / BLOCK_SIZE
    }

    /// Read the next byte of the file
    ///
    /// Returns `None` if the byte has not been received yet, or the end of the file is reached.
    /// Use [`CanFile::eof`] to tell the two apart. Consuming the last byte of a block frees its
    /// slot and requests the next block.
    pub fn get(&mut self, stack: &mut dyn NetworkStack, now_ms: u64) -> Option<u8> {
        if !self.has_bytes_ready() {
            return None;
        }
        let slot = self.current_slot();
        let byte = self.buffer[slot][self.offset as usize % BLOCK_SIZE];
        self.offset = ((self.offset as usize + 1) % BUFFER_SIZE) as u16;

        if self.offset as usize % BLOCK_SIZE == 0 {
            self.valid &= !(1 << slot);
            self.block_read += 1;
            self.advance(stack, now_ms);
        }
        Some(byte)
    }

    fn absolute_position(&self) -> u64 {
        self.block_read as u64 * BLOCK_SIZE as u64 + (self.offset as usize % BLOCK_SIZE) as u64
    }

    /// Position of the next byte to read
    pub fn position(&self) -> u32 {
        u32::try_from(self.absolute_position()).unwrap_or(u32::MAX)
    }

    /// Total size of the file
    pub fn size(&self) -> u32 {
        self.size
    }

    /// True once every byte has been read
    pub fn eof(&self) -> bool {
        self.absolute_position() >= self.size as u64
    }

    /// True if [`CanFile::get`] would return a byte
    pub fn has_bytes_ready(&self) -> bool {
        self.valid & (1 << self.current_slot()) != 0 && !self.eof()
    }

    /// Progress in percent, 0 while no job is open
    pub fn percent_done(&self) -> u8 {
        if self.is_open() && self.size != 0 {
            (self.absolute_position().min(self.size as u64) * 100 / self.size as u64) as u8
        } else {
            0
        }
    }

    /// Progress in hundredths of a percent, 0 while no job is open
    pub fn permyriad_done(&self) -> u16 {
        if self.is_open() && self.size != 0 {
            (self.absolute_position().min(self.size as u64) * 10000 / self.size as u64) as u16
        } else {
            0
        }
    }

    /// State of the link to the host
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// True once a block was received, until the transfer is closed
    pub fn is_receiving(&self) -> bool {
        self.opened
    }

    /// Index of the next block to receive
    pub fn block_write(&self) -> u32 {
        self.block_write
    }

    /// Index of the block being read
    pub fn block_read(&self) -> u32 {
        self.block_read
    }

    /// Bit mask of the slots holding unread data
    pub fn valid_mask(&self) -> u8 {
        self.valid
    }

    /// True while a job is open, printing or paused
    pub fn is_open(&self) -> bool {
        self.task != TaskState::Stopped
    }

    /// True while the job is printing
    pub fn is_printing(&self) -> bool {
        self.task == TaskState::Printing
    }

    /// True while the job is paused
    pub fn is_paused(&self) -> bool {
        self.task == TaskState::Paused
    }

    /// True while the job is printing and has data buffered
    pub fn is_fetching(&self) -> bool {
        self.valid != 0 && self.is_printing()
    }

    /// True while the job is finishing
    pub fn is_finishing(&self) -> bool {
        self.finishing
    }

    /// True while the job is being aborted
    pub fn is_aborting(&self) -> bool {
        self.aborting
    }

    /// Start or resume printing the job
    pub fn task_start<T: PrintTask + ?Sized>(&mut self, timer: &mut T) {
        self.task = TaskState::Printing;
        timer.start_job_timer();
    }

    /// Pause the job
    pub fn task_pause<T: PrintTask + ?Sized>(&mut self, timer: &mut T) {
        self.task = TaskState::Paused;
        timer.pause_job_timer();
    }

    /// The job is over
    pub fn task_stop(&mut self) {
        self.task = TaskState::Stopped;
        self.aborting = false;
        self.finishing = false;
    }

    /// The last byte was read, the job is finishing its moves
    pub fn task_finishing(&mut self) {
        self.valid = 0;
        self.finishing = true;
    }

    /// The job finished its moves
    pub fn task_finished(&mut self) {
        self.valid = 0;
        self.finishing = false;
    }

    /// Abort the job, closing the transfer
    pub fn task_aborting(&mut self, stack: &mut dyn NetworkStack) {
        self.valid = 0;
        self.aborting = true;
        self.stop(stack);
    }

    /// The abort is complete
    pub fn task_aborted(&mut self) {
        self.valid = 0;
        self.aborting = false;
        self.task_stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{MockPrinter, MockStack};

    const HOST: u8 = 0x10;
    const TIMEOUT: u32 = 1500;

    fn new_file() -> CanFile {
        CanFile::new(NodeId::new(HOST).unwrap(), TIMEOUT)
    }

    fn block(fill: u8) -> [u8; BLOCK_SIZE] {
        [fill; BLOCK_SIZE]
    }

    /// The block indices requested from the host, in order
    fn requests(stack: &mut MockStack) -> Vec<u32> {
        stack
            .take_writes()
            .iter()
            .map(|w| {
                assert_eq!(HOST, w.peer.raw());
                assert_eq!(0x2400, w.index);
                assert_eq!(Completion::Flush, w.completion);
                w.u32()
            })
            .collect()
    }

    #[test]
    fn test_open_zero_cancels() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(0, &mut stack, &mut printer, 0);
        assert!(!file.is_open());
        assert!(stack.remote_writes.is_empty());
        assert_eq!(vec![false], printer.canfile_opened);
        assert_eq!(0, printer.timer_starts);
    }

    #[test]
    fn test_full_transfer_closes_after_last_block() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(1024, &mut stack, &mut printer, 0);
        assert!(file.is_printing());
        assert_eq!(1, printer.timer_starts);
        assert_eq!(vec![true], printer.canfile_opened);
        assert_eq!(vec![0], requests(&mut stack));

        for i in 0..4u8 {
            file.receive_block(&block(i), &mut stack, 10);
        }
        // Blocks 1..3 requested as each previous one arrived, then the close
        assert_eq!(vec![1, 2, 3, END_OF_TRANSFER], requests(&mut stack));
        assert!(!file.is_receiving());
        assert_eq!(LinkState::Quiet, file.link_state());
        assert_eq!(0x0F, file.valid_mask());

        let mut count = 0;
        while let Some(b) = file.get(&mut stack, 20) {
            assert_eq!((count / BLOCK_SIZE) as u8, b);
            count += 1;
        }
        assert_eq!(1024, count);
        assert!(file.eof());
        assert_eq!(100, file.percent_done());
        assert_eq!(10000, file.permyriad_done());
        // Nothing more is requested once the transfer is closed
        assert!(stack.remote_writes.is_empty());
    }

    #[test]
    fn test_buffer_full_waits_for_reader() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(4096, &mut stack, &mut printer, 0);
        for i in 0..4u8 {
            file.receive_block(&block(i), &mut stack, 0);
        }
        assert_eq!(vec![0, 1, 2, 3], requests(&mut stack));
        assert_eq!(LinkState::Quiet, file.link_state());

        // Reading one whole block frees slot 0 and requests block 4
        for _ in 0..BLOCK_SIZE - 1 {
            assert_eq!(Some(0), file.get(&mut stack, 0));
        }
        assert!(stack.remote_writes.is_empty());
        assert_eq!(Some(0), file.get(&mut stack, 0));
        assert_eq!(vec![4], requests(&mut stack));
        assert_eq!(0x0E, file.valid_mask());
        assert_eq!(256, file.position());
        assert_eq!(6, file.percent_done());
    }

    #[test]
    fn test_unrequested_block_ignored() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.receive_block(&block(1), &mut stack, 0);
        assert_eq!(0, file.block_write());

        file.open(4096, &mut stack, &mut printer, 0);
        file.receive_block(&block(1), &mut stack, 0);
        stack.reject_writes = 1;
        file.receive_block(&block(2), &mut stack, 0);
        // The request for block 2 was refused, so no reply is expected
        assert_eq!(LinkState::RequestCached, file.link_state());
        file.receive_block(&block(3), &mut stack, 0);
        assert_eq!(2, file.block_write());
        assert_eq!(0x03, file.valid_mask());
    }

    #[test]
    fn test_partial_last_block() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(300, &mut stack, &mut printer, 0);
        file.receive_block(&block(7), &mut stack, 0);
        file.receive_block(&[9; 44], &mut stack, 0);
        assert_eq!(vec![0, 1, END_OF_TRANSFER], requests(&mut stack));

        let mut data = Vec::new();
        while let Some(b) = file.get(&mut stack, 0) {
            data.push(b);
        }
        assert_eq!(300, data.len());
        assert_eq!(9, data[299]);
        assert!(file.eof());
        assert!(!file.has_bytes_ready());
    }

    #[test]
    fn test_resume_position() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter {
            resume_position: Some(1300),
            ..Default::default()
        };
        let mut file = new_file();

        file.open(2000, &mut stack, &mut printer, 0);
        // 1300 / 256 = block 5, which lands in slot 1
        assert_eq!(vec![5], requests(&mut stack));
        assert_eq!(1300, file.position());
        assert!(!file.has_bytes_ready());

        let mut data = [0u8; BLOCK_SIZE];
        data[1300 % BLOCK_SIZE] = 0xAB;
        file.receive_block(&data, &mut stack, 0);
        assert_eq!(0x02, file.valid_mask());
        assert_eq!(Some(0xAB), file.get(&mut stack, 0));
        assert_eq!(65, file.percent_done());
    }

    #[test]
    fn test_timeout_requests_same_block_once() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(4096, &mut stack, &mut printer, 1000);
        assert_eq!(vec![0], requests(&mut stack));

        file.check_timeout(&mut stack, 1000 + TIMEOUT as u64 - 1);
        assert!(stack.remote_writes.is_empty());

        file.check_timeout(&mut stack, 1000 + TIMEOUT as u64);
        assert_eq!(vec![0], requests(&mut stack));
        // The deadline is re-armed from the retry
        file.check_timeout(&mut stack, 1000 + TIMEOUT as u64 + 1);
        assert!(stack.remote_writes.is_empty());
        assert_eq!(
            LinkState::Awaiting {
                deadline_ms: 1000 + 2 * TIMEOUT as u64
            },
            file.link_state()
        );
    }

    #[test]
    fn test_cached_request_flush() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        stack.reject_writes = 1;
        file.open(4096, &mut stack, &mut printer, 0);
        assert!(file.has_cache());
        assert!(stack.remote_writes.is_empty());
        // No deadline is armed for a request that was never sent
        file.check_timeout(&mut stack, 1_000_000);
        assert!(stack.remote_writes.is_empty());

        stack.reject_writes = 1;
        assert!(file.flush_cached(&mut stack, 0));
        assert!(file.has_cache());

        assert!(file.flush_cached(&mut stack, 0));
        assert!(!file.has_cache());
        assert_eq!(vec![0], requests(&mut stack));
        assert!(!file.flush_cached(&mut stack, 0));
    }

    #[test]
    fn test_abort_while_busy_defers_close() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(4096, &mut stack, &mut printer, 0);
        file.receive_block(&block(0), &mut stack, 0);
        assert_eq!(vec![0, 1], requests(&mut stack));

        file.task_aborting(&mut stack);
        assert!(file.is_aborting());
        assert!(stack.remote_writes.is_empty());
        assert_eq!(
            LinkState::CloseDeferred {
                deadline_ms: TIMEOUT as u64
            },
            file.link_state()
        );

        // The outstanding reply completes the close
        file.receive_block(&block(1), &mut stack, 5);
        assert_eq!(vec![END_OF_TRANSFER], requests(&mut stack));
        assert_eq!(LinkState::Quiet, file.link_state());
        assert!(!file.is_receiving());

        file.task_aborted();
        assert!(!file.is_open());
        assert!(!file.is_aborting());
    }

    #[test]
    fn test_deferred_close_on_timeout() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(4096, &mut stack, &mut printer, 0);
        requests(&mut stack);
        file.task_aborting(&mut stack);
        file.check_timeout(&mut stack, TIMEOUT as u64);
        assert_eq!(vec![END_OF_TRANSFER], requests(&mut stack));

        // A late reply is dropped
        file.receive_block(&block(0), &mut stack, TIMEOUT as u64 + 1);
        assert_eq!(0, file.block_write());
    }

    #[test]
    fn test_cached_close() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(256, &mut stack, &mut printer, 0);
        stack.reject_writes = 1;
        file.receive_block(&block(0), &mut stack, 0);
        assert_eq!(vec![0], requests(&mut stack));
        assert_eq!(LinkState::CloseCached, file.link_state());
        assert!(file.is_receiving());

        // Reading while the close is cached does not send anything new
        assert_eq!(Some(0), file.get(&mut stack, 0));
        assert!(stack.remote_writes.is_empty());

        assert!(file.flush_cached(&mut stack, 0));
        assert_eq!(vec![END_OF_TRANSFER], requests(&mut stack));
        assert!(!file.is_receiving());
        assert!(!file.has_cache());
    }

    #[test]
    fn test_reopen_restarts() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        file.open(4096, &mut stack, &mut printer, 0);
        file.receive_block(&block(0), &mut stack, 0);
        file.open(512, &mut stack, &mut printer, 100);
        assert_eq!(vec![0, 1, 0], requests(&mut stack));
        assert_eq!(512, file.size());
        assert_eq!(0, file.valid_mask());
        assert_eq!(0, file.block_write());
        assert_eq!(2, printer.timer_starts);
    }

    #[test]
    fn test_largest_file_tail() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter {
            resume_position: Some(u32::MAX - 100),
            ..Default::default()
        };
        let mut file = new_file();

        file.open(u32::MAX, &mut stack, &mut printer, 0);
        assert_eq!(vec![0xFF_FFFF], requests(&mut stack));
        assert_eq!(u32::MAX - 100, file.position());

        file.receive_block(&block(7), &mut stack, 10);
        assert_eq!(vec![END_OF_TRANSFER], requests(&mut stack));

        let mut count = 0;
        while file.get(&mut stack, 20).is_some() {
            count += 1;
        }
        assert_eq!(100, count);
        assert!(file.eof());
        assert_eq!(u32::MAX, file.position());
        assert_eq!(100, file.percent_done());
        assert_eq!(10000, file.permyriad_done());
    }

    #[test]
    fn test_task_lifecycle() {
        let mut stack = MockStack::default();
        let mut printer = MockPrinter::default();
        let mut file = new_file();

        assert_eq!(0, file.percent_done());
        file.open(4096, &mut stack, &mut printer, 0);
        file.receive_block(&block(0), &mut stack, 0);
        assert!(file.is_fetching());

        file.task_pause(&mut printer);
        assert!(file.is_paused());
        assert!(!file.is_fetching());
        assert_eq!(1, printer.timer_pauses);

        file.task_start(&mut printer);
        assert!(file.is_printing());

        file.task_finishing();
        assert!(file.is_finishing());
        assert!(!file.has_bytes_ready());
        file.task_finished();
        assert!(!file.is_finishing());
        file.task_stop();
        assert!(!file.is_open());
    }
}
