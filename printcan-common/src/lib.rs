//! Common functionality shared by the printcan crates.
//!
//! This crate holds everything that describes the bus itself rather than the behaviour of the
//! printer node: CAN frames, node IDs, NMT states, SDO abort codes, the object dictionary layout
//! used between the printer and its display / file host peers, and the node configuration.
//!
//! Most users will reach these types through the `printcan-node` re-export.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod commands;
pub mod config;
pub mod constants;
mod error;
pub mod messages;
pub mod nmt;
pub mod node_id;
pub mod sdo;
pub mod traits;

#[cfg(feature = "socketcan")]
mod socketcan;

#[cfg(feature = "socketcan")]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub use socketcan::SocketCanPeripheral;

pub use error::NetworkError;
pub use messages::{CanId, CanMessage};
pub use node_id::NodeId;
