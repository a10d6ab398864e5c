//! Common traits

use crate::messages::CanMessage;

/// Access to a CAN controller
///
/// This is the boundary between the transport and the hardware. Implementations must not block:
/// a full transmit mailbox is reported by handing the frame back, and an empty receive FIFO by
/// returning `None`.
pub trait CanPeripheral {
    /// Place a frame into a free transmit mailbox
    ///
    /// Returns the frame unchanged if no mailbox is free.
    fn try_transmit(&mut self, msg: CanMessage) -> Result<(), CanMessage>;

    /// Take the next frame from the receive FIFO, if any
    fn receive(&mut self) -> Option<CanMessage>;

    /// Configure the bus bitrate
    fn set_bitrate(&mut self, bitrate: u32);

    /// Configure the preemption and sub priority of the controller's RX/TX interrupts
    ///
    /// The default implementation does nothing, for controllers which are not interrupt driven.
    fn set_irq_priority(&mut self, _preempt: u8, _sub: u8) {}
}

impl<T: CanPeripheral + ?Sized> CanPeripheral for &mut T {
    fn try_transmit(&mut self, msg: CanMessage) -> Result<(), CanMessage> {
        (**self).try_transmit(msg)
    }

    fn receive(&mut self) -> Option<CanMessage> {
        (**self).receive()
    }

    fn set_bitrate(&mut self, bitrate: u32) {
        (**self).set_bitrate(bitrate)
    }

    fn set_irq_priority(&mut self, preempt: u8, sub: u8) {
        (**self).set_irq_priority(preempt, sub)
    }
}
