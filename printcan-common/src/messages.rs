//! CAN frame types
//!
//! The printer network only ever uses standard 11-bit identifiers. Extended identifiers still have
//! a representation here so that a peripheral can report what it actually received, and the
//! transport can drop it.

/// Largest value of an 11-bit identifier
pub const MAX_STD_ID: u16 = 0x7FF;

/// A CAN identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanId {
    /// A standard 11-bit identifier
    Std(u16),
    /// An extended 29-bit identifier
    Extended(u32),
}

impl CanId {
    /// Create a standard identifier, masking the value to 11 bits
    pub const fn std(id: u16) -> Self {
        Self::Std(id & MAX_STD_ID)
    }

    /// Create an extended identifier, masking the value to 29 bits
    pub const fn extended(id: u32) -> Self {
        Self::Extended(id & 0x1FFF_FFFF)
    }

    /// Get the raw identifier value
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Std(id) => *id as u32,
            CanId::Extended(id) => *id,
        }
    }

    /// True for 29-bit identifiers
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }
}

/// A single CAN frame with up to 8 data bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanMessage {
    id: CanId,
    rtr: bool,
    dlc: u8,
    data: [u8; 8],
}

impl Default for CanMessage {
    fn default() -> Self {
        Self {
            id: CanId::Std(0),
            rtr: false,
            dlc: 0,
            data: [0; 8],
        }
    }
}

impl CanMessage {
    /// Create a data frame
    ///
    /// At most 8 bytes are taken from `data`; anything beyond that is ignored.
    pub fn new(id: CanId, data: &[u8]) -> Self {
        let dlc = data.len().min(8);
        let mut buf = [0u8; 8];
        buf[..dlc].copy_from_slice(&data[..dlc]);
        Self {
            id,
            rtr: false,
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// Create a remote transmission request frame
    pub fn new_rtr(id: CanId, dlc: u8) -> Self {
        Self {
            id,
            rtr: true,
            dlc: dlc.min(8),
            data: [0; 8],
        }
    }

    /// The frame identifier
    pub fn id(&self) -> CanId {
        self.id
    }

    /// True if this is a remote frame
    pub fn is_rtr(&self) -> bool {
        self.rtr
    }

    /// The data length code (0..=8)
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// The valid data bytes
    pub fn data(&self) -> &[u8] {
        if self.rtr {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }

    /// The full 8-byte payload buffer, including unused trailing bytes
    pub fn raw_data(&self) -> &[u8; 8] {
        &self.data
    }
}
