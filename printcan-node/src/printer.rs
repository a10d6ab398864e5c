//! Interfaces to the rest of the printer firmware
//!
//! The node never touches heaters, steppers or the G-code queue directly. It reads the machine
//! state through [`Printer::snapshot`] / [`Printer::display_snapshot`] and requests changes with
//! [`DeviceAction`]s, which the firmware performs (or ignores) on its own terms.

/// State of a print job started from local media
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JobState {
    /// No job open
    #[default]
    Idle,
    /// A job is printing
    Printing,
    /// A job is open but paused
    Paused,
}

impl JobState {
    /// True if a job is open, paused or not
    pub fn is_open(&self) -> bool {
        !matches!(self, JobState::Idle)
    }

    /// True if the job is paused
    pub fn is_paused(&self) -> bool {
        matches!(self, JobState::Paused)
    }
}

/// WiFi module state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WifiSnapshot {
    /// Connected to the cloud service
    pub cloud: bool,
    /// Camera streaming
    pub camera: bool,
    /// Module specific work code, 4 bits
    pub work_code: u8,
}

/// Machine state broadcast to every peer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrinterSnapshot {
    /// Index of the active tool
    pub active_tool: u8,
    /// Job printed from local media
    pub media_job: JobState,
    /// A host is streaming G-code over a serial link
    pub host_streaming: bool,
    /// Steppers are enabled
    pub motors_enabled: bool,
    /// Case light is on
    pub case_light: bool,
    /// Automatic bed leveling is active
    pub auto_leveling: bool,
    /// Automatic power off is armed
    pub auto_power: bool,
    /// Local media is inserted
    pub disk_inserted: bool,
    /// The planner has moves queued
    pub moving: bool,
    /// The bed probe triggered state is valid
    pub probe_valid: bool,
    /// A heater wait is in progress
    pub wait_heating: bool,
    /// Power loss recovery data is armed
    pub powerloss_armed: bool,
    /// WiFi module state
    pub wifi: WifiSnapshot,
}

/// Print statistics
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrintStats {
    /// Prints started
    pub total: u32,
    /// Prints finished
    pub finished: u32,
    /// Longest print, seconds
    pub longest_s: u32,
    /// Total print time, seconds
    pub used_s: u32,
    /// Filament used, mm
    pub filament_mm: f32,
}

/// Values shown on the display
///
/// Temperature and motion arrays are indexed in dictionary sub-index order minus one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplaySnapshot {
    /// Current temperature per channel, `None` for channels the machine does not have
    pub current_temp: [Option<f32>; 8],
    /// Target temperature per channel
    pub target_temp: [Option<f32>; 8],
    /// Progress of a media job, percent
    pub progress_percent: u8,
    /// Elapsed print time, seconds
    pub elapsed_s: u32,
    /// Flow percentage per extruder
    pub flow_percent: [i16; 4],
    /// Feedrate percentage
    pub feedrate_percent: i16,
    /// Hotend, part and auxiliary fan percentages
    pub fan_percent: [u8; 3],
    /// Auto shutdown time
    pub shutdown_time: u16,
    /// X, X2, Y, Z position in mm
    pub position: [f32; 4],
    /// Steps per mm of X, Y, Z, E0..E3
    pub steps_per_mm: [f32; 7],
    /// Print, retract, travel and maximum X, Y, Z, E accelerations
    pub acceleration: [f32; 7],
    /// Print statistics
    pub stats: PrintStats,
    /// Z probe offset in mm
    pub z_offset: f32,
    /// Leveling fade height in mm
    pub fade_height: f32,
}

/// An axis which can be jogged from the display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

/// A change requested by a peer
///
/// Channel and axis numbers are zero based and follow the order of the dictionary records.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceAction {
    /// Set a heater target
    SetTargetTemp {
        /// Temperature channel
        heater: u8,
        /// New target
        celsius: f32,
    },
    /// Set the flow percentage of an extruder
    SetFlowPercent {
        /// Extruder index
        extruder: u8,
        /// New flow percentage
        percent: i16,
    },
    /// Set the feedrate percentage
    SetFeedratePercent(i16),
    /// Set a fan speed
    SetFanPercent {
        /// 0: hotend, 1: part cooling, 2: auxiliary
        fan: u8,
        /// New speed
        percent: u8,
    },
    /// Set the steps/mm of an axis
    SetStepsPerMm {
        /// X, Y, Z, E0..E3
        axis: u8,
        /// New value
        value: f32,
    },
    /// Set an acceleration
    SetAcceleration {
        /// Print, retract, travel, max X, max Y, max Z, max E
        which: u8,
        /// New value in mm/s²
        value: f32,
    },
    /// Set the Z probe offset
    SetZOffset(f32),
    /// Set the leveling fade height
    SetFadeHeight(f32),
    /// Pause the running print
    PausePrint,
    /// Resume a paused print
    ResumePrint,
    /// Stop the running print
    StopPrint,
    /// Stop all motion immediately
    QuickStop,
    /// Queue a G-code line
    InjectGcode(&'static str),
    /// Queue a relative move
    MoveRelative {
        /// Axis to move
        axis: Axis,
        /// Distance, negative to move toward the minimum
        mm: f32,
    },
    /// Extrude (positive) or retract (negative) the active tool
    Extrude {
        /// Distance in mm
        mm: f32,
    },
    /// Enter or leave the first unpacking mode
    FirstUnpack(bool),
    /// Enable or disable all steppers
    SetMotorsEnabled(bool),
    /// Switch the case light
    SetCaseLight(bool),
    /// Switch automatic bed leveling
    SetAutoLeveling(bool),
    /// Change the active tool
    SetActiveTool(u8),
    /// Cancel an operation the machine is waiting on
    CancelOperation(printcan_common::commands::Operation),
    /// Stop waiting for the heaters
    SkipHeatingWait,
    /// The user confirmed a prompt
    UserConfirmed,
    /// Response to a filament load prompt
    FilamentResponse(printcan_common::commands::Loading),
    /// Power the machine off
    PowerOff,
}

/// One entry of a media directory listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaEntry<'a> {
    /// Position in the listing
    pub index: u16,
    /// True for directories
    pub is_dir: bool,
    /// Size in bytes
    pub size: u32,
    /// Modification time
    pub timestamp: u32,
    /// Long file name
    pub name: &'a str,
}

/// The local file system browsed by the display
pub trait MediaLibrary {
    /// Re-read the working directory
    fn refresh(&mut self);
    /// Number of entries in the working directory
    fn count(&self) -> u16;
    /// True if the working directory is the root
    fn is_at_root(&self) -> bool;
    /// Go to the parent directory
    fn up_dir(&mut self);
    /// Get an entry of the working directory
    fn entry(&mut self, index: u16) -> Option<MediaEntry<'_>>;
    /// Enter a sub directory
    fn change_dir(&mut self, index: u16);
    /// Start printing a file
    fn print(&mut self, index: u16);
    /// Name of the file being printed or last selected
    fn current_filename(&self) -> &str;
}

/// Print job timer
pub trait PrintJobTimer {
    /// Start or restart the timer
    fn start_job_timer(&mut self);
    /// Pause the timer
    fn pause_job_timer(&mut self);
}

/// Power loss recovery
pub trait PowerLossRecovery {
    /// Byte offset to resume a CANFILE job at, if a job was interrupted
    fn resume_position(&self) -> Option<u32>;
    /// Told whenever a CANFILE job is opened (true) or rejected (false)
    fn canfile_opened(&mut self, opened: bool);
}

/// The services a print task needs from the rest of the firmware
pub trait PrintTask: PrintJobTimer + PowerLossRecovery {}

impl<T: PrintJobTimer + PowerLossRecovery + ?Sized> PrintTask for T {}

/// The printer, as seen from the network
pub trait Printer: PrintJobTimer + PowerLossRecovery {
    /// Current machine state
    fn snapshot(&self) -> PrinterSnapshot;
    /// Current values for the display
    fn display_snapshot(&self) -> DisplaySnapshot;
    /// Perform an action
    fn perform(&mut self, action: DeviceAction);
    /// True if the filament sensor sees filament
    fn filament_present(&self) -> bool;
    /// True if the active tool's target is below the minimum extrusion temperature
    fn target_too_cold_to_extrude(&self) -> bool;
    /// True if the active tool is below the minimum extrusion temperature
    fn too_cold_to_extrude(&self) -> bool;
    /// Local media, if the machine has a card reader
    fn media(&mut self) -> Option<&mut dyn MediaLibrary>;
}
