//! Packing of the broadcast state entries
//!
//! The global record (0x3000) is a set of small bit fields, packed LSB first.
use int_enum::IntEnum;

use crate::printer::PrinterSnapshot;

/// Coarse machine state reported in the global record
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WorkState {
    /// Nothing going on
    Idle = 0,
    /// A job is printing
    Printing = 1,
    /// A job is paused
    Paused = 2,
    /// A host is streaming G-code
    Online = 3,
    /// Reserved
    Pausing = 4,
    /// Reserved
    Resuming = 5,
    /// Reserved
    Stopping = 6,
}

/// Registration state reported in the global record
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RegState {
    /// Not registered
    Unregistered = 0,
    /// Trial period
    Trial = 1,
    /// Limited
    Limit = 2,
    /// Registered
    Valid = 3,
}

/// Compute the work state
///
/// `canfile_open` / `canfile_paused` describe the CANFILE job, the media job comes from the
/// snapshot.
pub fn work_state(
    snapshot: &PrinterSnapshot,
    canfile_open: bool,
    canfile_paused: bool,
) -> WorkState {
    if canfile_open || snapshot.media_job.is_open() {
        if canfile_paused || snapshot.media_job.is_paused() {
            WorkState::Paused
        } else {
            WorkState::Printing
        }
    } else if snapshot.host_streaming {
        WorkState::Online
    } else {
        WorkState::Idle
    }
}

/// `{activeT:2, reserved:1, workState:3, validState:2}`
pub fn pack_common(active_tool: u8, work: WorkState, reg: RegState) -> u8 {
    (active_tool & 0x3) | ((u8::from(work) & 0x7) << 3) | ((u8::from(reg) & 0x3) << 6)
}

/// `{reserved:2, cloud:1, camera:1, workCode:4}`
pub fn pack_wifi(snapshot: &PrinterSnapshot) -> u8 {
    let wifi = &snapshot.wifi;
    ((wifi.cloud as u8) << 2) | ((wifi.camera as u8) << 3) | ((wifi.work_code & 0xF) << 4)
}

/// `{reserved:5, autoLeveling:1, autoPower:1, caseLight:1, reserved:8}`
pub fn pack_switch(snapshot: &PrinterSnapshot) -> u16 {
    ((snapshot.auto_leveling as u16) << 5)
        | ((snapshot.auto_power as u16) << 6)
        | ((snapshot.case_light as u16) << 7)
}

/// `{reserved:3, powerloss:1, waitHeating:1, probeValid:1, moving:1, diskState:1, reserved:8}`
pub fn pack_state(snapshot: &PrinterSnapshot) -> u16 {
    ((snapshot.powerloss_armed as u16) << 3)
        | ((snapshot.wait_heating as u16) << 4)
        | ((snapshot.probe_valid as u16) << 5)
        | ((snapshot.moving as u16) << 6)
        | ((snapshot.disk_inserted as u16) << 7)
}

/// Encode a temperature as carried in the temperature records: `(celsius + 300) * 50`
pub fn encode_temp(celsius: f32) -> u16 {
    ((celsius + 300.0) * 50.0) as u16
}

/// Decode a temperature from the temperature records
pub fn decode_temp(raw: u16) -> f32 {
    raw as f32 / 50.0 - 300.0
}
