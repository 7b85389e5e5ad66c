//! The `handle` module provides the exclusive producer and consumer ends of a split ring.
//!
//! Each handle is the only one of its side, so the ring can be used without locks. Handles
//! can be moved to other threads but not cloned. The mapping is released once both are dropped.

use std::sync::Arc;

use crate::ring::{MirroredRingBuffer, RingError};

/// Producing end of a split `MirroredRingBuffer`
pub struct Producer<T: Copy> {
    ring: Arc<MirroredRingBuffer<T>>,
}

impl<T: Copy> Producer<T> {
    pub(crate) fn new(ring: Arc<MirroredRingBuffer<T>>) -> Self {
        Producer { ring }
    }

    /// Append `element`, or fail with [`RingError::Full`] without side effects
    #[inline]
    pub fn deposit(&mut self, element: &T) -> Result<(), RingError> {
        // SAFETY: this is the only producer of the ring
        unsafe { self.ring.deposit_exclusive(element) }
    }

    /// Number of elements not yet taken by the consumer
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Consuming end of a split `MirroredRingBuffer`
pub struct Consumer<T: Copy> {
    ring: Arc<MirroredRingBuffer<T>>,
}

impl<T: Copy> Consumer<T> {
    pub(crate) fn new(ring: Arc<MirroredRingBuffer<T>>) -> Self {
        Consumer { ring }
    }

    /// Remove and return the oldest element, or fail with [`RingError::Empty`]
    #[inline]
    pub fn get(&mut self) -> Result<T, RingError> {
        // SAFETY: this is the only consumer of the ring
        unsafe { self.ring.get_exclusive() }
    }

    /// Skip every unread element and continue at the producer's current position
    #[inline]
    pub fn reset(&mut self) {
        // SAFETY: this is the only consumer of the ring
        unsafe { self.ring.reset_exclusive() }
    }

    #[inline]
    pub fn can_get(&self) -> bool {
        self.ring.can_get()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
