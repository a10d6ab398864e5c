//! Definitions for the NMT protocol

/// NMT state of a remote node, as reported by its heartbeat
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NmtState {
    /// The node is booting
    Bootup = 0,
    /// The node is no longer heard on the bus
    Disconnected = 1,
    /// The node is connecting
    Connecting = 2,
    /// The node has been stopped
    Stopped = 4,
    /// Normal operational state
    Operational = 5,
    /// The node is waiting for a command to enter operation
    PreOperational = 127,
}

impl NmtState {
    /// True if the node is in the Operational state
    pub fn is_operational(&self) -> bool {
        *self == NmtState::Operational
    }
}

impl core::fmt::Display for NmtState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            NmtState::Bootup => "Bootup",
            NmtState::Disconnected => "Disconnected",
            NmtState::Connecting => "Connecting",
            NmtState::Stopped => "Stopped",
            NmtState::Operational => "Operational",
            NmtState::PreOperational => "PreOperational",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// An error for [`NmtState::try_from()`]
pub struct InvalidNmtStateError(pub u8);

impl TryFrom<u8> for NmtState {
    type Error = InvalidNmtStateError;

    /// Convert the state byte of a heartbeat message
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NmtState::Bootup),
            1 => Ok(NmtState::Disconnected),
            2 => Ok(NmtState::Connecting),
            4 => Ok(NmtState::Stopped),
            5 => Ok(NmtState::Operational),
            127 => Ok(NmtState::PreOperational),
            _ => Err(InvalidNmtStateError(value)),
        }
    }
}
