//! A fixed capacity FIFO for outgoing CAN frames
//!
//! The ring does no locking of its own. It is owned by [`CanTransport`](crate::CanTransport), which
//! only touches it with the drain interrupt masked.
use heapless::Deque;

/// A circular buffer holding up to `N` items
pub struct FrameRing<const N: usize, T: Copy> {
    items: Deque<T, N>,
}

impl<const N: usize, T: Copy> core::fmt::Debug for FrameRing<N, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameRing")
            .field("len", &self.len())
            .field("capacity", &N)
            .finish()
    }
}

impl<const N: usize, T: Copy> Default for FrameRing<N, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, T: Copy> FrameRing<N, T> {
    /// Create an empty ring
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
        }
    }

    /// Number of items the ring can hold
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True if no more items can be pushed
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Append an item at the tail
    ///
    /// Returns the item if the ring is full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        self.items.push_back(item)
    }

    /// Get a copy of the oldest item without removing it
    pub fn front(&self) -> Option<T> {
        self.items.front().copied()
    }

    /// Remove and return the oldest item
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Drop all queued items
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fifo_order_and_capacity() {
        let mut ring: FrameRing<3, u8> = FrameRing::new();
        assert!(ring.is_empty());
        assert_eq!(3, ring.capacity());

        ring.push(1).unwrap();
        ring.push(2).unwrap();
        ring.push(3).unwrap();
        assert!(ring.is_full());
        assert_eq!(Err(4), ring.push(4));
        assert_eq!(3, ring.len());

        assert_eq!(Some(1), ring.front());
        assert_eq!(Some(1), ring.pop());
        ring.push(4).unwrap();
        assert_eq!(Some(2), ring.pop());
        assert_eq!(Some(3), ring.pop());
        assert_eq!(Some(4), ring.pop());
        assert_eq!(None, ring.pop());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_every_slot_usable() {
        let mut ring: FrameRing<64, u32> = FrameRing::new();
        for i in 0..64 {
            ring.push(i).unwrap();
        }
        assert!(ring.is_full());
        assert_eq!(Err(64), ring.push(64));
        assert_eq!(64, ring.len());
    }

    #[test]
    fn test_wraparound() {
        let mut ring: FrameRing<2, u32> = FrameRing::new();
        for i in 0..20 {
            ring.push(i).unwrap();
            assert_eq!(1, ring.len());
            assert_eq!(Some(i), ring.pop());
        }
        ring.push(1).unwrap();
        ring.clear();
        assert!(ring.is_empty());
    }
}
