use snafu::Snafu;

use crate::sdo::RawAbortCode;

/// Errors reported by the network stack for outbound exchanges
///
/// None of these are fatal. A [`NetworkError::TransportFull`] is resolved by caching the message
/// and retrying on the next flush, a [`NetworkError::PeerTimeout`] by re-requesting, and a
/// [`NetworkError::ProtocolAbort`] is logged and treated as "nothing learned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkError {
    /// The message could not be queued for transmission
    #[snafu(display("Transmit queue full"))]
    TransportFull,
    /// A reply deadline passed without an answer from the peer
    #[snafu(display("Peer did not respond in time"))]
    PeerTimeout,
    /// The peer aborted the SDO exchange
    #[snafu(display("Peer aborted exchange: {code}"))]
    ProtocolAbort {
        /// The abort code sent by the peer
        code: RawAbortCode,
    },
    /// A received frame or payload could not be interpreted
    #[snafu(display("Malformed frame"))]
    MalformedFrame,
}
