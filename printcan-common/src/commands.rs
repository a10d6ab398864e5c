//! Command and notification codes exchanged with the display
//!
//! Commands arrive packed into the 16-bit command objects (0x2001..0x2004). Unknown codes are
//! rejected by the `TryFrom` conversions and the command is ignored by the node.

use int_enum::IntEnum;

/// Print task command, low byte of the task command object
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TaskCommand {
    /// Pause the running print
    Pause = 0,
    /// Resume a paused print
    Resume = 1,
    /// Stop the running print
    Stop = 2,
    /// Change filament during a print
    Change = 3,
    /// Continue a print after power loss
    AccidentResume = 4,
    /// Discard a print interrupted by power loss
    AccidentCancel = 5,
}

/// Axis operation, high byte of the move command object
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MoveCommand {
    /// Home all axes
    HomeAll = 0,
    /// Home X
    HomeX = 1,
    /// Home Y
    HomeY = 2,
    /// Home Z
    HomeZ = 3,
    /// Move X in the negative direction
    XMinus = 4,
    /// Move Y in the negative direction
    YMinus = 5,
    /// Move Z in the negative direction
    ZMinus = 6,
    /// Move X in the positive direction
    XPlus = 7,
    /// Move Y in the positive direction
    YPlus = 8,
    /// Move Z in the positive direction
    ZPlus = 9,
}

/// Move distance, low byte of the move command object
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MoveUnit {
    /// 0.1 mm
    Tenth = 0,
    /// 1 mm
    One = 1,
    /// 10 mm
    Ten = 2,
    /// 100 mm
    Hundred = 3,
}

impl MoveUnit {
    /// The move distance in mm
    pub fn mm(&self) -> f32 {
        match self {
            MoveUnit::Tenth => 0.1,
            MoveUnit::One => 1.0,
            MoveUnit::Ten => 10.0,
            MoveUnit::Hundred => 100.0,
        }
    }
}

/// Generic command, high byte of the common command object
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommonCommand {
    /// Restore factory settings
    FactoryReset = 0,
    /// Save settings
    SaveSettings = 1,
    /// First unpacking of the machine, parameter is a [`Switch`]
    FirstUnpack = 2,
    /// Refresh the file listing, parameter is a [`FileAction`]
    RefreshFile = 3,
    /// Enable or disable the motors, parameter is a [`Switch`]
    MotorSwitch = 4,
    /// Babystep the bed
    Babystep = 5,
    /// Case light, parameter is a [`Switch`]
    CaseLight = 6,
    /// Automatic shutdown, parameter is a [`Switch`]
    AutoShutdown = 7,
    /// Automatic bed leveling, parameter is a [`Switch`]
    AutoLeveling = 8,
    /// Change the active tool, parameter is the tool index
    ChangeTool = 9,
    /// Cancel a waiting operation, parameter is an [`Operation`]
    StopOperation = 10,
    /// Heating wait response, parameter is a [`Heating`]
    WaitHeating = 11,
    /// Filament load response, parameter is a [`Loading`]
    LoadFilament = 12,
    /// Probe the bed
    LevelingProbe = 13,
    /// The user confirmed a prompt
    UserConfirmed = 14,
    /// Power off the machine
    AutoPowerOff = 15,
}

/// On / off / toggle parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Switch {
    /// Off
    Off = 0,
    /// On
    On = 1,
    /// Invert the current state
    Toggle = 0xFF,
}

impl Switch {
    /// Apply the switch to a current state
    pub fn apply(&self, current: bool) -> bool {
        match self {
            Switch::Off => false,
            Switch::On => true,
            Switch::Toggle => !current,
        }
    }
}

/// The operation to cancel for [`CommonCommand::StopOperation`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Operation {
    /// Homing
    Home = 0,
    /// Axis move
    Move = 1,
    /// Extrusion
    Extrude = 2,
    /// Bed probing
    Probe = 3,
    /// Pending shutdown
    Shutdown = 4,
}

/// Response to a heating wait
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Heating {
    /// Stop waiting for the heaters
    Skip = 0,
    /// Heat again
    Again = 1,
}

/// Response to a filament load prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Loading {
    /// Continue printing
    Continue = 0,
    /// Purge more filament
    More = 1,
}

/// What to refresh for [`CommonCommand::RefreshFile`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FileAction {
    /// Send the listing of the working directory
    WorkDir = 0,
    /// Send the name of the current file
    FileName = 1,
}

/// Notifications sent from the printer to the display
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
#[allow(missing_docs)]
pub enum Notification {
    MediaInsert = 0,
    MediaRemove = 1,
    MediaError = 2,
    FactoryDone = 3,
    SaveDone = 4,
    TaskDone = 5,
    TimerStart = 6,
    TimerPause = 7,
    TimerStop = 8,
    AxisMoving = 9,
    FilaExtrude = 10,
    FilaRetract = 11,
    FilaLoading = 12,
    FilaUnloading = 13,
    HomeStart = 14,
    HomeDone = 15,
    LevelingStart = 16,
    LevelingDone = 17,
    FilamentError = 18,
    TarTempLow = 19,
    CurTempLow = 20,
    WaitingUser = 21,
    HeaterTimeout = 22,
    HeaterHeating = 23,
    HeaterFinish = 24,
    PrintSyncing = 25,
    PrintParking = 26,
    PrintParked = 27,
    PrintResuming = 28,
    FilamentInit = 29,
    FilamentDelay = 30,
    FilamentWait = 31,
    FilamentPurge = 32,
    PurgeFinish = 33,
    PurgeOption = 34,
    ActionFinish = 35,
    MaxTempHigh = 36,
    PoweroffSafety = 37,
    OtherNotify = 38,
}

/// Split a 16-bit command value into its (high, low) bytes
pub fn split_command(value: u16) -> (u8, u8) {
    ((value >> 8) as u8, value as u8)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_command_decoding() {
        let (cmd, param) = split_command(0x0601);
        assert_eq!(Ok(CommonCommand::CaseLight), CommonCommand::try_from(cmd));
        assert_eq!(Ok(Switch::On), Switch::try_from(param));
        assert_eq!(Err(16), CommonCommand::try_from(16));
        assert_eq!(Ok(Switch::Toggle), Switch::try_from(0xFF));
    }

    #[test]
    fn test_switch_apply() {
        assert!(Switch::Toggle.apply(false));
        assert!(!Switch::Toggle.apply(true));
        assert!(!Switch::Off.apply(true));
    }

    #[test]
    fn test_notification_codes() {
        assert_eq!(31u16, Notification::FilamentWait.into());
        assert_eq!(Ok(Notification::OtherNotify), Notification::try_from(38));
    }
}
