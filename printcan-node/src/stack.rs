//! The seam between the printer node and the CANopen engine
//!
//! The object dictionary, SDO client/server, PDO and heartbeat machinery are provided by an
//! external stack. The node drives it through [`NetworkStack`], and the stack reports what
//! happened on the bus as [`StackEvent`]s and dictionary writes.
use printcan_common::{nmt::NmtState, NetworkError, NodeId};

/// What to do when an outbound SDO exchange finishes
///
/// The stack hands this back unchanged in [`StackEvent::SdoFinished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Release the line and retry any cached message for the peer
    Flush,
    /// The result is the peer's producer heartbeat time
    HeartbeatTime,
    /// A file listing record was delivered, send the next one
    FileList,
}

/// Events reported by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent<'d> {
    /// A peer sent its boot-up message
    PeerBootup(NodeId),
    /// A peer's heartbeat reported a new NMT state
    PeerStateChanged(NodeId, NmtState),
    /// A peer's heartbeat was not received in time
    HeartbeatLost(NodeId),
    /// An SDO exchange started by the node finished
    SdoFinished {
        /// The peer of the exchange
        peer: NodeId,
        /// The completion passed when the exchange was started
        completion: Completion,
        /// The data read, empty for writes, or the reason the exchange failed
        result: Result<&'d [u8], NetworkError>,
    },
}

/// The operations of the CANopen stack used by the printer node
///
/// PDO numbers are zero based: PDO 0 is the first transmit PDO.
pub trait NetworkStack {
    /// Start an SDO download to a peer
    ///
    /// Returns an error if the exchange could not be started, e.g. because the client line for the
    /// peer is still busy or the transmit queue is full. On success, the stack later reports a
    /// [`StackEvent::SdoFinished`] carrying `completion`.
    fn write_remote(
        &mut self,
        peer: NodeId,
        index: u16,
        sub: u8,
        data: &[u8],
        completion: Completion,
        block_mode: bool,
    ) -> Result<(), NetworkError>;

    /// Start an SDO upload from a peer
    fn read_remote(
        &mut self,
        peer: NodeId,
        index: u16,
        sub: u8,
        completion: Completion,
    ) -> Result<(), NetworkError>;

    /// Release the SDO client line to a peer, abandoning any exchange in progress
    fn reset_client_line(&mut self, peer: NodeId);

    /// Enable or disable a transmit PDO
    fn set_pdo_enabled(&mut self, pdo: u8, enabled: bool);

    /// Store a consumer heartbeat entry
    ///
    /// Returns false if `slot` does not exist in the consumer heartbeat table.
    fn set_consumer_heartbeat(&mut self, slot: u8, peer: NodeId, timeout_ms: u16) -> bool;

    /// Store a value in the local object dictionary
    fn write_local(&mut self, index: u16, sub: u8, data: &[u8]);

    /// Ask to be told about remote writes to a local dictionary entry
    fn register_write_observer(&mut self, index: u16, sub: u8);
}
