//! The CAN network layer of a 3D printer controller
//!
//! Printcan-node connects the printer firmware to the other nodes on its CAN bus: a touch display
//! and, optionally, a host which streams print files to the printer. It is intended to run on
//! the printer's microcontroller, so it is no_std compatible and performs no heap allocation. The
//! CANopen protocol engine itself (object dictionary, SDO, PDO, NMT) is provided by an external
//! stack, which the node drives through the [`NetworkStack`] trait.
//!
//! It provides the following:
//!
//! * A [`CanTransport`] which queues outgoing frames in a [`FrameRing`] while the transmit
//!   mailboxes are busy, drained from a timer interrupt.
//! * A [`HeartbeatMonitor`] which tracks which peers are operational, reads their heartbeat
//!   period when they boot, and keeps the global state broadcast running while anyone listens.
//! * The [`PrinterNode`], which publishes the machine state into the dictionary and acts on the
//!   commands the display writes into it.
//! * A [`CanFile`] receiver, which pulls a print file from the host in 256 byte blocks and hands
//!   it to the print task one byte at a time.
//!
//! # Getting Started
//!
//! ## Configuration
//!
//! A node is described by a [`NodeConfig`](common::config::NodeConfig), which can be loaded from
//! a TOML file when the `std` feature is enabled.
//!
//! ## Node Creation
//!
//! ```ignore
//! let mut node = PrinterNode::new(&config)?;
//! node.init(&mut stack);
//! ```
//!
//! ## Calling the node
//!
//! The node keeps no references to the stack or the firmware. Every call which needs them takes a
//! [`NodeContext`]:
//!
//! ```ignore
//! loop {
//!     let mut ctx = NodeContext::new(&mut stack, &mut printer, now_ms());
//!     while let Some(event) = stack_events.pop() {
//!         node.handle_event(event, &mut ctx);
//!     }
//!     node.process(&mut ctx);
//!     delay_ms(100);
//! }
//! ```
//!
//! Writes by a remote node to any entry listed in [`PrinterNode::dispatch`] must be passed to
//! [`PrinterNode::on_write`] by the stack's write callback.
//!
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod canfile;
pub mod dispatch;
pub mod file_list;
mod frame_ring;
mod handlers;
pub mod heartbeat;
#[cfg(test)]
mod mock;
mod node;
pub mod notify;
pub mod printer;
pub mod stack;
pub mod status;
pub mod transport;

// Re-export types used by the application
pub use critical_section;
pub use printcan_common as common;

pub use canfile::CanFile;
#[cfg(feature = "socketcan")]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub use common::SocketCanPeripheral;
pub use frame_ring::FrameRing;
pub use heartbeat::HeartbeatMonitor;
pub use node::{NodeContext, PrinterNode};
pub use printer::{MediaLibrary, PrintTask, Printer};
pub use stack::{Completion, NetworkStack, StackEvent};
pub use transport::{CanTransport, CriticalSectionMask, IrqMask, TimerIrqMask, TransportConfig};
