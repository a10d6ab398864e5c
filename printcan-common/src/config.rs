//! Node configuration
//!
//! A [`NodeConfig`] describes one printer node: its own identity on the bus, the constant values it
//! publishes in its object dictionary, the capabilities of the machine, and which peers it talks
//! to.
//!
//! With the `std` feature, the configuration can be loaded from TOML. Every field except `node_id`
//! has a usable default, so a minimal file only has to name the node:
//!
//! ```toml
//! node_id = 0x10
//! device_name = "PEEK-300"
//! canfile_host = 1
//!
//! [machine]
//! extruders = 2
//! heated_chamber = true
//!
//! [display]
//! node_id = 1
//! heartbeat_slot = 0
//! ```
use heapless::String;
use snafu::Snafu;

use crate::{constants::values, node_id::NodeId};

/// Copy as much of `s` as fits into a fixed capacity string
///
/// Truncation happens on a character boundary.
pub fn hstr<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Error returned when validating a [`NodeConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// A node ID is outside of 1..=127
    #[snafu(display("Invalid node id {id} for {what}"))]
    InvalidNodeId {
        /// Which setting holds the bad ID
        what: &'static str,
        /// The bad value
        id: u8,
    },
    /// The display heartbeat slot does not exist in the consumer heartbeat table
    #[snafu(display("Heartbeat slot {slot} exceeds the consumer table size {size}"))]
    InvalidHeartbeatSlot {
        /// Configured slot
        slot: u8,
        /// Number of slots available
        size: u8,
    },
    /// More extruders than the dictionary has room for
    #[snafu(display("{count} extruders configured, at most 4 are supported"))]
    TooManyExtruders {
        /// Configured count
        count: u8,
    },
}

/// Error returned by [`NodeConfig::load_from_str`] and [`NodeConfig::load`]
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
#[derive(Debug, Snafu)]
pub enum LoadConfigError {
    /// The TOML could not be parsed
    #[snafu(display("Error parsing TOML: {source}"))]
    ParseToml {
        /// The underlying parser error
        source: toml::de::Error,
    },
    /// The configuration file could not be read
    #[snafu(display("Error reading {path}: {source}"))]
    Io {
        /// The path which failed to load
        path: std::string::String,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The configuration parsed, but is not usable
    #[snafu(display("Invalid configuration: {source}"))]
    Invalid {
        /// The validation failure
        source: ConfigError,
    },
}

/// Number of entries in the consumer heartbeat table
pub const CONSUMER_HEARTBEAT_SLOTS: u8 = 4;

/// SYNC producer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(default, deny_unknown_fields))]
pub struct SyncConfig {
    /// COB-ID of the SYNC message
    pub cob_id: u32,
    /// Whether this node produces the SYNC message
    pub generate: bool,
    /// SYNC period in microseconds
    pub period_us: u32,
    /// Synchronous window in microseconds
    pub window_us: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cob_id: values::SYNC_COB_ID,
            generate: true,
            period_us: 100_000,
            window_us: 10_000,
        }
    }
}

impl SyncConfig {
    /// The value to store in the SYNC COB-ID object
    pub fn cob_id_value(&self) -> u32 {
        if self.generate {
            self.cob_id | values::SYNC_GENERATE
        } else {
            self.cob_id
        }
    }
}

/// Values for the identity object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(default, deny_unknown_fields))]
pub struct IdentityConfig {
    /// Vendor ID
    pub vendor_id: u32,
    /// Product code, describing the combination of boards in the machine
    pub product_code: u32,
    /// Revision number, the hardware release date as BCD (e.g. 0x20240315)
    pub revision_number: u32,
    /// Serial number
    pub serial_number: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            vendor_id: values::VENDOR_ID,
            product_code: 0,
            revision_number: 0x2024_0315,
            serial_number: 0,
        }
    }
}

/// Machine capabilities, reported to the display and used to decide what to broadcast
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(default, deny_unknown_fields))]
pub struct MachineConfig {
    /// Number of extruders (0..=4)
    pub extruders: u8,
    /// Maximum temperature of each hotend
    pub hotend_max_temp: [i16; 4],
    /// Margin kept below each hotend maximum when reporting the settable maximum
    pub hotend_overshoot: i16,
    /// Machine has a heated bed
    pub heated_bed: bool,
    /// Maximum bed target
    pub bed_max_temp: i16,
    /// Machine has a heated chamber
    pub heated_chamber: bool,
    /// Maximum chamber target
    pub chamber_max_temp: i16,
    /// Machine has a WiFi module
    pub wifi: bool,
    /// Machine supports bed leveling
    pub leveling: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            extruders: 1,
            hotend_max_temp: [275, 275, 275, 275],
            hotend_overshoot: 15,
            heated_bed: true,
            bed_max_temp: 110,
            heated_chamber: false,
            chamber_max_temp: 60,
            wifi: false,
            leveling: true,
        }
    }
}

/// The display peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(deny_unknown_fields))]
pub struct DisplayConfig {
    /// Node ID of the display
    pub node_id: u8,
    /// Entry of the consumer heartbeat table reserved for the display
    pub heartbeat_slot: u8,
}

/// Configuration for a printer node
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(default, deny_unknown_fields))]
pub struct NodeConfig {
    /// Own node ID. 0 means unset and fails validation.
    pub node_id: u8,
    /// Bus bitrate
    pub bitrate: u32,
    /// Producer heartbeat period, in ms
    pub heartbeat_period_ms: u16,
    /// SDO client timeout, in ms
    ///
    /// CANFILE block requests are retried after half of this.
    pub sdo_timeout_ms: u32,
    /// SYNC producer settings
    pub sync: SyncConfig,
    /// Identity object
    pub identity: IdentityConfig,
    /// Machine name
    pub device_name: String<32>,
    /// Hardware version string
    pub hardware_version: String<16>,
    /// Firmware version string
    pub software_version: String<16>,
    /// Display UI version this firmware was built against
    pub ui_version: String<16>,
    /// Machine capabilities
    pub machine: MachineConfig,
    /// The display peer, if the machine has one
    pub display: Option<DisplayConfig>,
    /// Node ID of the CANFILE host, if files are streamed over the bus
    pub canfile_host: Option<u8>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            bitrate: 500_000,
            heartbeat_period_ms: 3000,
            sdo_timeout_ms: 3000,
            sync: SyncConfig::default(),
            identity: IdentityConfig::default(),
            device_name: hstr("printcan"),
            hardware_version: hstr("1.0.0"),
            software_version: hstr("0.1.0"),
            ui_version: hstr("7.1.0"),
            machine: MachineConfig::default(),
            display: None,
            canfile_host: None,
        }
    }
}

fn check_node_id(what: &'static str, id: u8) -> Result<NodeId, ConfigError> {
    NodeId::new(id).map_err(|_| ConfigError::InvalidNodeId { what, id })
}

impl NodeConfig {
    /// Create a default configuration for the given node ID
    pub fn new(node_id: u8) -> Self {
        Self {
            node_id,
            ..Default::default()
        }
    }

    /// Check the configuration for values the node cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_node_id("node_id", self.node_id)?;
        if let Some(display) = &self.display {
            check_node_id("display.node_id", display.node_id)?;
            if display.heartbeat_slot >= CONSUMER_HEARTBEAT_SLOTS {
                return InvalidHeartbeatSlotSnafu {
                    slot: display.heartbeat_slot,
                    size: CONSUMER_HEARTBEAT_SLOTS,
                }
                .fail();
            }
        }
        if let Some(host) = self.canfile_host {
            check_node_id("canfile_host", host)?;
        }
        if self.machine.extruders > 4 {
            return TooManyExtrudersSnafu {
                count: self.machine.extruders,
            }
            .fail();
        }
        Ok(())
    }

    /// The own node ID
    pub fn node_id(&self) -> Result<NodeId, ConfigError> {
        check_node_id("node_id", self.node_id)
    }

    /// The display node ID, if a display is configured
    pub fn display_id(&self) -> Result<Option<NodeId>, ConfigError> {
        self.display
            .map(|d| check_node_id("display.node_id", d.node_id))
            .transpose()
    }

    /// The CANFILE host node ID, if one is configured
    pub fn canfile_host_id(&self) -> Result<Option<NodeId>, ConfigError> {
        self.canfile_host
            .map(|id| check_node_id("canfile_host", id))
            .transpose()
    }

    /// Deadline for a CANFILE block request, in ms
    pub fn block_request_timeout_ms(&self) -> u32 {
        self.sdo_timeout_ms / 2
    }

    /// Read a configuration from a TOML string
    ///
    /// The configuration is validated before it is returned.
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn load_from_str(config: &str) -> Result<Self, LoadConfigError> {
        use snafu::ResultExt;
        let config: NodeConfig = toml::from_str(config).context(ParseTomlSnafu)?;
        config.validate().context(InvalidSnafu)?;
        Ok(config)
    }

    /// Read a configuration from a TOML file
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, LoadConfigError> {
        use snafu::ResultExt;
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).context(IoSnafu {
            path: path.display().to_string(),
        })?;
        Self::load_from_str(&text)
    }
}
