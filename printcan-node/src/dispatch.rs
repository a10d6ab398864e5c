//! Routing of dictionary writes to their handlers
//!
//! The table is built once when the node is created, from the features the node is configured
//! with, and never changes afterwards. Every key in it is registered with the stack as a write
//! observer during [`PrinterNode::init`](crate::PrinterNode::init).
use defmt_or_log::warn;
use heapless::FnvIndexMap;
use printcan_common::constants::{object_ids, sub, values};

/// Capacity of the dispatch table
pub const MAX_HANDLERS: usize = 64;

/// What to do with a write to a dictionary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteHandler {
    /// Set the target of a temperature channel (zero based)
    TargetTemp(u8),
    /// Set the flow percentage of an extruder
    Flow(u8),
    /// Set the feedrate percentage
    Feedrate,
    /// Set a fan speed
    Fan(u8),
    /// Set the steps/mm of an axis
    StepsPerMm(u8),
    /// Set an acceleration
    Acceleration(u8),
    /// Set the Z probe offset
    ZOffset,
    /// Set the leveling fade height
    FadeHeight,
    /// Print task command
    TaskCommand,
    /// Axis move command
    MoveCommand,
    /// Extrude command
    ExtrudeCommand,
    /// Generic command
    CommonCommand,
    /// File listing selection
    FileIndex,
    /// CANFILE size, opens a transfer
    CanFileSize,
    /// CANFILE block data
    CanFileBlock,
    /// Accepted without action
    Accept,
}

/// Map from (index, sub-index) to [`WriteHandler`]
#[derive(Debug)]
pub struct DispatchTable {
    map: FnvIndexMap<(u16, u8), WriteHandler, MAX_HANDLERS>,
}

impl DispatchTable {
    /// Build the table
    ///
    /// Display entries are only routed when the node has a display, CANFILE entries only when it
    /// has a file host.
    pub fn new(display: bool, canfile: bool) -> Self {
        let mut table = Self {
            map: FnvIndexMap::new(),
        };
        if display {
            table.add_display_handlers();
        }
        if canfile {
            table.add(
                object_ids::CANFILE,
                sub::canfile::SIZE,
                WriteHandler::CanFileSize,
            );
            table.add(
                object_ids::CANFILE,
                sub::canfile::BUFFER,
                WriteHandler::CanFileBlock,
            );
        }
        table
    }

    fn add(&mut self, index: u16, sub: u8, handler: WriteHandler) {
        if self.map.insert((index, sub), handler).is_err() {
            warn!("Dispatch table full, no handler for {:x}sub{}", index, sub);
            debug_assert!(false, "dispatch table capacity exceeded");
        }
    }

    fn add_display_handlers(&mut self) {
        for channel in 0..sub::temp::COUNT {
            self.add(
                object_ids::TAR_TEMP,
                channel + 1,
                WriteHandler::TargetTemp(channel),
            );
        }
        for extruder in 0..4 {
            self.add(
                object_ids::TASK_INFO,
                sub::task::FLOW_E0 + extruder,
                WriteHandler::Flow(extruder),
            );
        }
        self.add(
            object_ids::TASK_INFO,
            sub::task::FEEDRATE,
            WriteHandler::Feedrate,
        );

        for fan in 0..3 {
            self.add(
                object_ids::PERCENT,
                sub::percent::FAN_T + fan,
                WriteHandler::Fan(fan),
            );
        }
        self.add(
            object_ids::PERCENT,
            sub::percent::FAN_RESERVE,
            WriteHandler::Accept,
        );
        self.add(
            object_ids::PERCENT,
            sub::percent::SHUTDOWN_TIME,
            WriteHandler::Accept,
        );

        for axis in 0..sub::MOTION_COUNT {
            self.add(
                object_ids::STEPS_PER_MM,
                axis + 1,
                WriteHandler::StepsPerMm(axis),
            );
            self.add(
                object_ids::ACCELERATION,
                axis + 1,
                WriteHandler::Acceleration(axis),
            );
        }
        for reg in 0..sub::REGISTER_COUNT {
            self.add(object_ids::REGISTER, reg + 1, WriteHandler::Accept);
        }
        self.add(
            object_ids::LEVELING,
            sub::leveling::Z_OFFSET,
            WriteHandler::ZOffset,
        );
        self.add(
            object_ids::LEVELING,
            sub::leveling::FADE_HEIGHT,
            WriteHandler::FadeHeight,
        );

        self.add(object_ids::CMD_TASK, 0, WriteHandler::TaskCommand);
        self.add(object_ids::CMD_MOVE, 0, WriteHandler::MoveCommand);
        self.add(object_ids::CMD_EXTRUDE, 0, WriteHandler::ExtrudeCommand);
        self.add(object_ids::CMD_COMMON, 0, WriteHandler::CommonCommand);
        self.add(object_ids::FILE_INDEX, 0, WriteHandler::FileIndex);
    }

    /// Find the handler for an entry
    pub fn lookup(&self, index: u16, sub: u8) -> Option<WriteHandler> {
        self.map.get(&(index, sub)).copied()
    }

    /// All routed entries
    pub fn keys(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.map.keys().copied()
    }

    /// Number of routed entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if nothing is routed
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Display PDOs which stay enabled while the display is connected
pub fn active_display_pdos(leveling: bool) -> impl Iterator<Item = u8> {
    (values::DISPLAY_PDO_FIRST..=values::DISPLAY_PDO_LAST).filter(move |pdo| {
        !values::DISPLAY_PDO_RESERVED.contains(pdo) && (leveling || *pdo != values::LEVELING_PDO)
    })
}
