//! Notifications to the display
//!
//! A notification is a 2-byte code written to the display's notification entry. If the stack
//! refuses the write, the code is kept and sent again one at a time as exchanges with the display
//! finish.
use defmt_or_log::{debug, warn};
use heapless::Deque;
use printcan_common::{commands::Notification, constants::object_ids, NodeId};

use crate::stack::{Completion, NetworkStack};

/// Number of refused notifications kept for retry
pub const NOTIFY_QUEUE_SIZE: usize = 8;

/// Sends notifications to the display, caching the ones which could not be sent
#[derive(Debug)]
pub struct NotificationQueue {
    display: NodeId,
    cached: Deque<Notification, NOTIFY_QUEUE_SIZE>,
}

impl NotificationQueue {
    /// Create an empty queue for `display`
    pub const fn new(display: NodeId) -> Self {
        Self {
            display,
            cached: Deque::new(),
        }
    }

    fn write(&self, notification: Notification, stack: &mut dyn NetworkStack) -> bool {
        let code = u16::from(notification);
        stack
            .write_remote(
                self.display,
                object_ids::NOTIFY_OUTPUT,
                0,
                &code.to_le_bytes(),
                Completion::Flush,
                false,
            )
            .is_ok()
    }

    /// Send a notification, or cache it if the stack refuses it
    ///
    /// When the cache is full the notification is dropped.
    pub fn send(&mut self, notification: Notification, stack: &mut dyn NetworkStack) {
        if self.write(notification, stack) {
            debug!("Notify {:?}", notification);
        } else if self.cached.push_back(notification).is_err() {
            warn!("Notification cache full, dropping {:?}", notification);
        } else {
            debug!("Notify {:?} cached", notification);
        }
    }

    /// True if a refused notification waits to be sent
    pub fn has_cache(&self) -> bool {
        !self.cached.is_empty()
    }

    /// Number of cached notifications
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    /// Try to send the oldest cached notification
    ///
    /// Returns true if there was one. If it is refused again it stays first in line.
    pub fn retry(&mut self, stack: &mut dyn NetworkStack) -> bool {
        let Some(notification) = self.cached.pop_front() else {
            return false;
        };
        if self.write(notification, stack) {
            debug!("Notify {:?} resent", notification);
        } else {
            // The slot just freed by pop_front is still free
            self.cached.push_front(notification).ok();
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockStack;

    #[test]
    fn test_send_and_retry() {
        let mut stack = MockStack::default();
        let mut queue = NotificationQueue::new(NodeId::new(2).unwrap());

        queue.send(Notification::TaskDone, &mut stack);
        let writes = stack.take_writes();
        assert_eq!(1, writes.len());
        assert_eq!(0x2300, writes[0].index);
        assert_eq!(5, writes[0].u16());
        assert!(!queue.has_cache());

        stack.reject_writes = 2;
        queue.send(Notification::FilamentWait, &mut stack);
        queue.send(Notification::TarTempLow, &mut stack);
        assert_eq!(2, queue.cached_len());

        // One per retry, oldest first
        assert!(queue.retry(&mut stack));
        assert_eq!(1, queue.cached_len());
        stack.reject_writes = 1;
        assert!(queue.retry(&mut stack));
        assert_eq!(1, queue.cached_len());
        assert!(queue.retry(&mut stack));
        assert!(!queue.retry(&mut stack));

        let codes: Vec<u16> = stack.take_writes().iter().map(|w| w.u16()).collect();
        assert_eq!(vec![31, 19], codes);
    }

    #[test]
    fn test_cache_overflow_drops() {
        let mut stack = MockStack::default();
        let mut queue = NotificationQueue::new(NodeId::new(2).unwrap());

        stack.reject_writes = NOTIFY_QUEUE_SIZE + 1;
        for _ in 0..NOTIFY_QUEUE_SIZE + 1 {
            queue.send(Notification::OtherNotify, &mut stack);
        }
        assert_eq!(NOTIFY_QUEUE_SIZE, queue.cached_len());
    }
}
