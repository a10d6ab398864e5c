use defmt_or_log::{debug, warn};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame, Socket};

use crate::{
    messages::{CanId, CanMessage},
    traits::CanPeripheral,
};

fn socketcan_id_to_printcan_id(id: socketcan::CanId) -> CanId {
    match id {
        socketcan::CanId::Standard(id) => CanId::std(id.as_raw()),
        socketcan::CanId::Extended(id) => CanId::extended(id.as_raw()),
    }
}

fn socketcan_frame_to_printcan_message(frame: CanFrame) -> Option<CanMessage> {
    let id = socketcan_id_to_printcan_id(frame.can_id());

    match frame {
        CanFrame::Data(frame) => Some(CanMessage::new(id, frame.data())),
        CanFrame::Remote(frame) => Some(CanMessage::new_rtr(id, EmbeddedFrame::dlc(&frame) as u8)),
        CanFrame::Error(_) => None,
    }
}

fn printcan_message_to_socketcan_frame(msg: &CanMessage) -> Option<CanFrame> {
    let id: socketcan::Id = match msg.id() {
        CanId::Std(id) => socketcan::StandardId::new(id)?.into(),
        CanId::Extended(id) => socketcan::ExtendedId::new(id)?.into(),
    };

    if msg.is_rtr() {
        CanFrame::new_remote(id, msg.dlc() as usize)
    } else {
        CanFrame::new(id, msg.data())
    }
}

/// A [`CanPeripheral`] backed by a non-blocking Linux CAN socket
///
/// The kernel's socket send buffer plays the role of the hardware transmit mailbox: when it is
/// full the write would block, and the frame is handed back to the caller.
#[derive(Debug)]
pub struct SocketCanPeripheral {
    socket: CanSocket,
}

impl SocketCanPeripheral {
    /// Open a socketcan device
    ///
    /// # Arguments
    /// * `device` - The name of the socketcan device to open, e.g. "vcan0", or "can0"
    pub fn open<S: AsRef<str>>(device: S) -> Result<Self, socketcan::IoError> {
        let socket = CanSocket::open(device.as_ref())?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl CanPeripheral for SocketCanPeripheral {
    fn try_transmit(&mut self, msg: CanMessage) -> Result<(), CanMessage> {
        let Some(frame) = printcan_message_to_socketcan_frame(&msg) else {
            warn!("Unable to convert {:?} to a socketcan frame", msg);
            return Ok(());
        };
        self.socket.write_frame(&frame).map_err(|_| msg)
    }

    fn receive(&mut self) -> Option<CanMessage> {
        loop {
            match self.socket.read_frame() {
                Ok(frame) => {
                    if let Some(msg) = socketcan_frame_to_printcan_message(frame) {
                        return Some(msg);
                    }
                    // error frames are skipped
                }
                Err(_) => return None,
            }
        }
    }

    fn set_bitrate(&mut self, bitrate: u32) {
        // The bitrate of a socketcan interface is set by `ip link`, outside of the socket
        debug!("Ignoring bitrate {} for socketcan interface", bitrate);
    }
}
