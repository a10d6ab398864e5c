//! Interrupt driven CAN transport
//!
//! The transport owns the CAN peripheral and a [`FrameRing`] of frames waiting for a free transmit
//! mailbox. Two execution contexts use it:
//!
//! - The application, which calls [`CanTransport::send`] through the network stack.
//! - A periodic timer interrupt, which calls [`CanTransport::on_timer`] to move queued frames into
//!   the hardware and hand received frames to the network stack. Dispatching a received frame can
//!   itself lead to a `send` from timer context.
//!
//! Every access to the ring and the peripheral happens inside [`IrqMask::masked`], so the timer
//! can never observe a half updated head/tail pair.
//!
//! A frame may only take the direct path into a free mailbox when nothing is queued. Otherwise it
//! could overtake frames which were queued before it.
//!
//! # Example
//!
//! ```ignore
//! static TRANSPORT: StaticCell<CanTransport<BxCan, TimerIrqMask<CanTimer>>> = StaticCell::new();
//!
//! let mask = TimerIrqMask::new(CanTimer::new(dp.TIM7));
//! let transport = TRANSPORT.init(CanTransport::new(can, mask, TransportConfig::default())?);
//! transport.mask().start(&TransportConfig::default());
//!
//! #[interrupt]
//! fn TIM7() {
//!     transport.on_timer(|msg| canopen_stack.dispatch(msg));
//! }
//! ```
use core::cell::RefCell;

use defmt_or_log::{debug, warn};
use printcan_common::{traits::CanPeripheral, CanMessage};
use snafu::Snafu;

use crate::frame_ring::FrameRing;

/// Number of transmit frames which can be queued while all mailboxes are busy
pub const TX_RING_SIZE: usize = 64;

/// Errors when creating a [`CanTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The CAN interrupts must preempt the timer interrupt
    #[snafu(display(
        "CAN IRQ priority {can} must be numerically lower than timer IRQ priority {timer}"
    ))]
    IrqPriorityOrder {
        /// Configured CAN interrupt priority
        can: u8,
        /// Configured timer interrupt priority
        timer: u8,
    },
}

/// Transport settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportConfig {
    /// Bus bitrate
    pub bitrate: u32,
    /// Preemption priority of the CAN RX/TX interrupts
    pub can_irq_priority: u8,
    /// Preemption priority of the drain timer interrupt
    pub timer_irq_priority: u8,
    /// Period of the drain timer
    pub poll_period_us: u32,
    /// Delay before the drain timer fires for the first time
    pub start_delay_us: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bitrate: 500_000,
            can_irq_priority: 13,
            timer_irq_priority: 14,
            poll_period_us: 50,
            start_delay_us: 500_000,
        }
    }
}

/// A way to keep the transport's drain interrupt from running
///
/// # Safety
///
/// While `f` runs inside [`IrqMask::masked`], no other execution context which uses the same
/// [`CanTransport`] may run. [`CriticalSectionMask`] satisfies this everywhere.
/// [`TimerIrqMask`] satisfies it only when the transport is used from the application and the
/// drain timer interrupt and nowhere else.
pub unsafe trait IrqMask {
    /// Run `f` with the drain interrupt masked
    fn masked<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// Mask all interrupts with a global critical section
#[derive(Debug, Default, Clone, Copy)]
pub struct CriticalSectionMask;

unsafe impl IrqMask for CriticalSectionMask {
    fn masked<R>(&self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| f())
    }
}

/// Control over the periodic timer which drives [`CanTransport::on_timer`]
pub trait TimerControl {
    /// Disable the timer's update interrupt
    fn disable_update_irq(&self);
    /// Enable the timer's update interrupt
    fn enable_update_irq(&self);
    /// Start the timer with the given priority, first expiry and period
    fn start(&self, irq_priority: u8, delay_us: u32, period_us: u32);
}

/// Mask only the drain timer's update interrupt
///
/// Higher priority interrupts, including the CAN peripheral's own, stay live.
#[derive(Debug)]
pub struct TimerIrqMask<T: TimerControl> {
    timer: T,
}

impl<T: TimerControl> TimerIrqMask<T> {
    /// Create a mask for `timer`
    pub const fn new(timer: T) -> Self {
        Self { timer }
    }

    /// Start the drain timer
    pub fn start(&self, config: &TransportConfig) {
        self.timer.start(
            config.timer_irq_priority,
            config.start_delay_us,
            config.poll_period_us,
        );
    }
}

struct Unmask<'a, T: TimerControl>(&'a T);

impl<T: TimerControl> Drop for Unmask<'_, T> {
    fn drop(&mut self) {
        self.0.enable_update_irq();
    }
}

unsafe impl<T: TimerControl> IrqMask for TimerIrqMask<T> {
    fn masked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.timer.disable_update_irq();
        let _unmask = Unmask(&self.timer);
        f()
    }
}

/// The CAN transport
pub struct CanTransport<P: CanPeripheral, M: IrqMask> {
    peripheral: RefCell<P>,
    tx_ring: RefCell<FrameRing<TX_RING_SIZE, CanMessage>>,
    mask: M,
}

impl<P: CanPeripheral, M: IrqMask> core::fmt::Debug for CanTransport<P, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CanTransport").finish_non_exhaustive()
    }
}

// SAFETY: The RefCells are only borrowed inside `mask.masked()`, and the IrqMask contract
// guarantees no other context using the transport runs during that time.
unsafe impl<P: CanPeripheral + Send, M: IrqMask + Sync> Sync for CanTransport<P, M> {}

impl<P: CanPeripheral, M: IrqMask> CanTransport<P, M> {
    /// Create a transport and configure the peripheral
    ///
    /// Fails if the CAN interrupt would not preempt the drain timer.
    pub fn new(
        mut peripheral: P,
        mask: M,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        if config.can_irq_priority >= config.timer_irq_priority {
            return IrqPriorityOrderSnafu {
                can: config.can_irq_priority,
                timer: config.timer_irq_priority,
            }
            .fail();
        }
        peripheral.set_irq_priority(config.can_irq_priority, 0);
        peripheral.set_bitrate(config.bitrate);
        debug!(
            "CAN transport at {} bit/s, CAN IRQ prio {}, timer IRQ prio {}",
            config.bitrate, config.can_irq_priority, config.timer_irq_priority
        );
        Ok(Self {
            peripheral: RefCell::new(peripheral),
            tx_ring: RefCell::new(FrameRing::new()),
            mask,
        })
    }

    /// Access the interrupt mask, e.g. to start the drain timer
    pub fn mask(&self) -> &M {
        &self.mask
    }

    /// Send a frame
    ///
    /// The frame goes straight to a free mailbox when nothing is queued, otherwise it is appended
    /// to the ring. Returns false only when the ring is full and the frame was dropped.
    pub fn send(&self, msg: CanMessage) -> bool {
        let sent = self.mask.masked(|| {
            let mut ring = self.tx_ring.borrow_mut();
            if ring.is_empty() {
                match self.peripheral.borrow_mut().try_transmit(msg) {
                    Ok(()) => return true,
                    Err(msg) => return ring.push(msg).is_ok(),
                }
            }
            ring.push(msg).is_ok()
        });
        if !sent {
            warn!("CAN transmit ring full, dropping frame {:?}", msg.id());
        }
        sent
    }

    /// Number of frames waiting for a mailbox
    pub fn pending(&self) -> usize {
        self.mask.masked(|| self.tx_ring.borrow().len())
    }

    /// Move queued frames into free mailboxes, oldest first
    ///
    /// Returns the number of frames handed to the peripheral.
    pub fn drain(&self) -> usize {
        self.mask.masked(|| {
            let mut ring = self.tx_ring.borrow_mut();
            let mut peripheral = self.peripheral.borrow_mut();
            let mut count = 0;
            while let Some(msg) = ring.front() {
                if peripheral.try_transmit(msg).is_err() {
                    break;
                }
                ring.pop();
                count += 1;
            }
            count
        })
    }

    /// Take the next received frame from the peripheral
    ///
    /// Frames with extended identifiers are not used on this network and are dropped.
    pub fn poll_receive(&self) -> Option<CanMessage> {
        loop {
            let msg = self.mask.masked(|| self.peripheral.borrow_mut().receive())?;
            if msg.id().is_extended() {
                debug!("Dropping extended frame {:?}", msg.id());
                continue;
            }
            return Some(msg);
        }
    }

    /// Periodic timer entry point
    ///
    /// Drains the transmit ring, then passes every received frame to `dispatch`. Dispatch runs
    /// outside of the mask, so it may call [`CanTransport::send`].
    pub fn on_timer(&self, mut dispatch: impl FnMut(CanMessage)) {
        self.drain();
        while let Some(msg) = self.poll_receive() {
            dispatch(msg);
        }
    }
}
