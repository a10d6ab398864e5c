//! Object indices, sub-indices and special values used on the printer network
//!
//! Indices below 0x2000 are standard communication objects. 0x2000..0x2100 are served by the
//! printer, 0x2200..0x2400 live on the display / file host and are written by the printer as an
//! SDO client, and 0x3000.. are broadcast by PDO.

/// Object indices
pub mod object_ids {
    /// SYNC COB-ID
    pub const SYNC_COB_ID: u16 = 0x1005;
    /// SYNC communication cycle period, in microseconds
    pub const SYNC_PERIOD: u16 = 0x1006;
    /// SYNC window length, in microseconds
    pub const SYNC_WINDOW: u16 = 0x1007;
    /// The Device Name object index
    pub const DEVICE_NAME: u16 = 0x1008;
    /// The hardware version object index
    pub const HARDWARE_VERSION: u16 = 0x1009;
    /// The software version object index
    pub const SOFTWARE_VERSION: u16 = 0x100A;
    /// Consumer heartbeat time table
    pub const HEARTBEAT_CONSUMER_TIME: u16 = 0x1016;
    /// The heartbeat producer time object index
    pub const HEARTBEAT_PRODUCER_TIME: u16 = 0x1017;
    /// The identity object index
    pub const IDENTITY: u16 = 0x1018;

    /// Machine information record
    pub const MACHINE_INFO: u16 = 0x2000;
    /// Print task command (pause / resume / stop / change filament)
    pub const CMD_TASK: u16 = 0x2001;
    /// Axis move command
    pub const CMD_MOVE: u16 = 0x2002;
    /// Extrude / retract / load / unload command
    pub const CMD_EXTRUDE: u16 = 0x2003;
    /// Other commands, command in the high byte and parameter in the low byte
    pub const CMD_COMMON: u16 = 0x2004;
    /// Select an entry of the current file listing
    pub const FILE_INDEX: u16 = 0x2005;
    /// Manual G-code input
    pub const GCODE_INPUT: u16 = 0x2006;
    /// CANFILE transfer record (size and block data)
    pub const CANFILE: u16 = 0x2007;
    /// Maximum temperature table
    pub const MAX_TEMP: u16 = 0x2100;

    /// File listing buffer on the display
    pub const FILE_BUFFER: u16 = 0x2200;
    /// Notification input on the display
    pub const NOTIFY_OUTPUT: u16 = 0x2300;
    /// Text message input on the display
    pub const MSG_OUTPUT: u16 = 0x2301;
    /// Block index input on the CANFILE host
    pub const CANFILE_BLOCK_ID: u16 = 0x2400;

    /// Global state broadcast (PDO1)
    pub const GLOBAL: u16 = 0x3000;
    /// Current temperatures
    pub const CUR_TEMP: u16 = 0x3001;
    /// Target temperatures
    pub const TAR_TEMP: u16 = 0x3002;
    /// Print task information
    pub const TASK_INFO: u16 = 0x3003;
    /// Fan and other percentage values
    pub const PERCENT: u16 = 0x3004;
    /// Axis positions
    pub const POSITION: u16 = 0x3005;
    /// Steps per mm
    pub const STEPS_PER_MM: u16 = 0x3006;
    /// Accelerations
    pub const ACCELERATION: u16 = 0x3007;
    /// Reserved motor parameters
    pub const STEP_RESERVE: u16 = 0x3008;
    /// Print statistics
    pub const STATISTICS: u16 = 0x3009;
    /// Registration
    pub const REGISTER: u16 = 0x300A;
    /// Bed leveling parameters
    pub const LEVELING: u16 = 0x300B;
}

/// Sub-indices of the records above
pub mod sub {
    /// Sub-indices of [`super::object_ids::IDENTITY`]
    pub mod identity {
        /// Vendor ID
        pub const VENDOR_ID: u8 = 1;
        /// Product code
        pub const PRODUCT_CODE: u8 = 2;
        /// Revision number
        pub const REVISION: u8 = 3;
        /// Serial number
        pub const SERIAL: u8 = 4;
    }

    /// Sub-indices of [`super::object_ids::MACHINE_INFO`]
    pub mod machine_info {
        /// Firmware version string
        pub const FW_VERSION: u8 = 1;
        /// Display UI version string
        pub const UI_VERSION: u8 = 2;
        /// Number of extruders
        pub const EXTRUDERS: u8 = 3;
        /// Heated bed present
        pub const BED: u8 = 4;
        /// Heated chamber present
        pub const CHAMBER: u8 = 5;
        /// Heated filament chamber present
        pub const FILAMENT_CHAMBER: u8 = 6;
        /// Water temperature sensor present
        pub const WATER_TEMP: u8 = 7;
        /// WiFi module present
        pub const WIFI: u8 = 8;
        /// Camera present
        pub const CAMERA: u8 = 9;
    }

    /// Sub-indices of [`super::object_ids::CANFILE`]
    pub mod canfile {
        /// Total file size, u32
        pub const SIZE: u8 = 1;
        /// One block of file data
        pub const BUFFER: u8 = 2;
    }

    /// Sub-indices of [`super::object_ids::GLOBAL`]
    pub mod global {
        /// Active tool, work state and registration state
        pub const COMMON: u8 = 1;
        /// WiFi state
        pub const WIFI: u8 = 2;
        /// Switch states
        pub const SWITCH: u8 = 3;
        /// Machine state flags
        pub const STATE: u8 = 4;
    }

    /// Sub-indices shared by the temperature records
    ///
    /// Used by [`super::object_ids::CUR_TEMP`], [`super::object_ids::TAR_TEMP`] and the first
    /// eight entries of [`super::object_ids::MAX_TEMP`].
    pub mod temp {
        /// Hotend 0
        pub const E0: u8 = 1;
        /// Hotend 1
        pub const E1: u8 = 2;
        /// Hotend 2
        pub const E2: u8 = 3;
        /// Hotend 3
        pub const E3: u8 = 4;
        /// Heated bed
        pub const BED: u8 = 5;
        /// Heated chamber
        pub const CHAMBER: u8 = 6;
        /// Filament chamber
        pub const FILAMENT: u8 = 7;
        /// Water cooling
        pub const WATER: u8 = 8;
        /// Number of temperature channels
        pub const COUNT: u8 = 8;
        /// Number of entries in the maximum temperature table, including reserved ones
        pub const MAX_TEMP_COUNT: u8 = 12;
    }

    /// Sub-indices of [`super::object_ids::TASK_INFO`]
    pub mod task {
        /// Print progress, percent
        pub const PERCENT: u8 = 1;
        /// Elapsed print time, seconds
        pub const TIME: u8 = 2;
        /// Flow rate of E0; E1..E3 follow
        pub const FLOW_E0: u8 = 3;
        /// Flow rate of E3
        pub const FLOW_E3: u8 = 6;
        /// Feedrate percentage
        pub const FEEDRATE: u8 = 7;
    }

    /// Sub-indices of [`super::object_ids::PERCENT`]
    pub mod percent {
        /// Hotend auto fan
        pub const FAN_T: u8 = 1;
        /// Part cooling fan
        pub const FAN_G: u8 = 2;
        /// Auxiliary fan
        pub const FAN_A: u8 = 3;
        /// Reserved fan
        pub const FAN_RESERVE: u8 = 4;
        /// Auto shutdown time
        pub const SHUTDOWN_TIME: u8 = 5;
    }

    /// Sub-indices of [`super::object_ids::POSITION`]
    pub mod position {
        /// X
        pub const X: u8 = 1;
        /// Second X carriage
        pub const X2: u8 = 2;
        /// Y
        pub const Y: u8 = 3;
        /// Z
        pub const Z: u8 = 4;
    }

    /// Sub-indices of [`super::object_ids::STATISTICS`]
    pub mod statistics {
        /// Total prints started
        pub const TOTAL: u8 = 1;
        /// Prints finished
        pub const FINISHED: u8 = 2;
        /// Longest print, seconds
        pub const LONGEST: u8 = 3;
        /// Total print time, seconds
        pub const USED: u8 = 4;
        /// Filament used, mm
        pub const FILAMENT: u8 = 5;
    }

    /// Sub-indices of [`super::object_ids::LEVELING`]
    pub mod leveling {
        /// Z probe offset, with inverted sign
        pub const Z_OFFSET: u8 = 1;
        /// Fade height
        pub const FADE_HEIGHT: u8 = 2;
    }

    /// Number of axis entries in the steps/mm and acceleration records
    pub const MOTION_COUNT: u8 = 7;
    /// Number of registration entries
    pub const REGISTER_COUNT: u8 = 2;
}

/// Special values
pub mod values {
    /// Return value of a dictionary write callback which accepted the write
    pub const OD_SUCCESSFUL: u32 = 0;

    /// Size of one CANFILE block in bytes
    pub const BLOCK_SIZE: usize = 256;
    /// Number of blocks buffered by the receiver
    pub const BLOCK_COUNT: usize = 4;
    /// Block index sent to the file host to end a transfer
    pub const END_OF_TRANSFER: u32 = u32::MAX;

    /// Bit which enables SYNC generation in the SYNC COB-ID object
    pub const SYNC_GENERATE: u32 = 0x4000_0000;
    /// Default SYNC COB-ID
    pub const SYNC_COB_ID: u32 = 0x80;
    /// Default vendor ID reported in the identity object
    pub const VENDOR_ID: u32 = 0xCBCB_CBCB;

    /// PDO number of the global state broadcast
    pub const GLOBAL_PDO: u8 = 0;
    /// First PDO number used by the display broadcasts
    pub const DISPLAY_PDO_FIRST: u8 = 1;
    /// Last PDO number used by the display broadcasts
    pub const DISPLAY_PDO_LAST: u8 = 28;
    /// Display PDOs which carry only reserved entries
    pub const DISPLAY_PDO_RESERVED: [u8; 6] = [3, 6, 21, 22, 25, 28];
    /// Display PDO carrying the leveling record
    pub const LEVELING_PDO: u8 = 27;

    /// File index value which means "go to the parent directory"
    pub const FILE_INDEX_UP: u16 = u16::MAX;
    /// Extrude command value which means "load filament"
    pub const EXTRUDE_LOAD: i16 = i16::MAX;
    /// Extrude command value which means "unload filament"
    pub const EXTRUDE_UNLOAD: i16 = i16::MIN;
}
