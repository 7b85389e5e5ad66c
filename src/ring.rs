//! The `ring` module is the core component of the `mirror-ring` library, providing the
//! `MirroredRingBuffer` struct for fixed-size element handoff between threads.
//!
//! Two access disciplines share the same cursors and memory:
//! - exclusive: [`MirroredRingBuffer::deposit`] / [`MirroredRingBuffer::get`] through `&mut self`,
//!   or the [`Producer`]/[`Consumer`] pair returned by [`MirroredRingBuffer::split`];
//! - shared: [`MirroredRingBuffer::multi_deposit`] / [`MirroredRingBuffer::multi_get`] through
//!   `&self`, serialized by one lock per side.
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::sync::Arc;

use thiserror::Error;

use crate::cursor::{self, Cursors};
use crate::handle::{Consumer, Producer};
use crate::locks::SideLocks;
use crate::region::{self, Mapping, Region};
use crate::ring::RingError::*;

/// `MirroredRingBuffer` is a bounded FIFO of `T` values backed by a mirrored memory mapping.
///
/// The ring holds `length` bytes, the requested capacity rounded up to the platform allocation
/// granularity. One element's worth of bytes is kept free so that a full ring can be told apart
/// from an empty one, see [`MirroredRingBuffer::capacity`].
///
/// Elements are copied in and out as raw bytes and are never interpreted by the ring.
pub struct MirroredRingBuffer<T> {
    /// Mapped memory holding the element bytes
    region: Region,
    /// Byte offsets of the oldest element and of the next free slot
    cursors: Cursors,
    /// Per-side locks used by the shared discipline
    locks: SideLocks,
    /// Ring length in bytes
    length: usize,
    _marker: PhantomData<T>,
}

// SAFETY: element bytes are only touched inside `[read, write)` by the consumer and
// outside of it by the producer. Each side is exclusive through either `&mut self`,
// a unique handle or its `SideLocks` mutex.
unsafe impl<T: Copy + Send> Send for MirroredRingBuffer<T> {}
unsafe impl<T: Copy + Send> Sync for MirroredRingBuffer<T> {}

/// `RingError` enumerates all possible errors returned by this library.
#[derive(Error, Debug)]
pub enum RingError {
    /// Requested capacity is zero, overflows when rounded, or cannot hold a single element.
    #[error("invalid capacity {requested} bytes for granularity {granularity}")]
    InvalidCapacity {
        requested: usize,
        granularity: usize,
    },
    /// The element type has no size.
    #[error("zero-sized element type")]
    ZeroSizedElement,
    /// An error occurred while reserving address space.
    #[error("error reserving address space: {0}")]
    FailedReserve(std::io::Error),
    /// An error occurred while creating the shared backing object.
    #[error("error creating backing object: {0}")]
    FailedBacking(std::io::Error),
    /// An error occurred while mapping the backing object.
    #[error("error mapping ring memory: {0}")]
    FailedMap(std::io::Error),
    /// Deposit rejected, the ring is full. Nothing was written.
    #[error("ring buffer full")]
    Full,
    /// Get rejected, the ring is empty.
    #[error("ring buffer empty")]
    Empty,
}

impl<T: Copy> MirroredRingBuffer<T> {
    /// Create a new ring of at least `capacity` bytes using the platform default [`Mapping`]
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        Self::with_mapping(capacity, Mapping::default())
    }

    /// Create a new ring of at least `capacity` bytes backed by the given `mapping`.
    ///
    /// `capacity` is rounded up to the allocation granularity of the platform. Construction
    /// fails with [`RingError::InvalidCapacity`] if the rounded length cannot hold at least one
    /// element of `T`, and with one of the `Failed*` errors if the memory cannot be mapped.
    pub fn with_mapping(capacity: usize, mapping: Mapping) -> Result<Self, RingError> {
        let granularity = mem::size_of::<T>();
        if granularity == 0 {
            return Err(ZeroSizedElement);
        }

        let page = region::allocation_granularity()?;
        let invalid = InvalidCapacity {
            requested: capacity,
            granularity,
        };
        let length = match capacity.checked_next_multiple_of(page) {
            Some(length) if length > granularity => length,
            _ => return Err(invalid),
        };

        let region = Region::new(length, mapping)?;

        tracing::debug!(
            capacity,
            length,
            granularity,
            ?mapping,
            "initialized ring buffer"
        );

        Ok(MirroredRingBuffer {
            region,
            cursors: Cursors::new(length, granularity),
            locks: SideLocks::new(),
            length,
            _marker: PhantomData,
        })
    }

    /// Append `element`, failing with [`RingError::Full`] without side effects when no slot is free.
    #[inline]
    pub fn deposit(&mut self, element: &T) -> Result<(), RingError> {
        // SAFETY: `&mut self` excludes any other producer.
        unsafe { self.deposit_exclusive(element) }
    }

    /// Remove and return the oldest element, or [`RingError::Empty`].
    #[inline]
    pub fn get(&mut self) -> Result<T, RingError> {
        // SAFETY: `&mut self` excludes any other consumer.
        unsafe { self.get_exclusive() }
    }

    /// Append `element` from any number of concurrent producers.
    ///
    /// Producers are serialized among themselves by the producer lock; they never wait on
    /// consumers.
    #[inline]
    pub fn multi_deposit(&self, element: &T) -> Result<(), RingError> {
        let _guard = self.locks.producer();
        // SAFETY: the producer lock is held.
        unsafe { self.deposit_exclusive(element) }
    }

    /// Remove and return the oldest element from any number of concurrent consumers.
    #[inline]
    pub fn multi_get(&self) -> Result<T, RingError> {
        let _guard = self.locks.consumer();
        // SAFETY: the consumer lock is held.
        unsafe { self.get_exclusive() }
    }

    /// Discard every unread element by moving the read cursor to the write cursor.
    #[inline]
    pub fn reset(&self) {
        let _guard = self.locks.consumer();
        self.cursors.reset();
    }

    /// Whether at least one element is available.
    #[inline]
    pub fn can_get(&self) -> bool {
        self.cursors.can_get()
    }

    /// Split the ring into a single [`Producer`] and a single [`Consumer`] for lock-free
    /// handoff between two threads.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let ring = Arc::new(self);
        (Producer::new(ring.clone()), Consumer::new(ring))
    }

    /// Number of live elements
    #[inline]
    pub fn len(&self) -> usize {
        self.cursors.used() / mem::size_of::<T>()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.can_get()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Maximum number of live elements
    #[inline]
    pub fn capacity(&self) -> usize {
        cursor::max_elements(self.length, mem::size_of::<T>())
    }

    /// Size of one element in bytes
    #[inline]
    pub fn granularity(&self) -> usize {
        mem::size_of::<T>()
    }

    /// Ring length in bytes after rounding
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn mapping(&self) -> Mapping {
        self.region.mapping()
    }

    /// # Safety
    /// The caller must be the only producer for the duration of the call.
    #[inline]
    pub(crate) unsafe fn deposit_exclusive(&self, element: &T) -> Result<(), RingError> {
        let write = self.cursors.claim_write().ok_or(Full)?;
        self.region
            .write_at(write, element as *const T as *const u8, mem::size_of::<T>());
        self.cursors.commit_write(write);
        Ok(())
    }

    /// # Safety
    /// The caller must be the only consumer for the duration of the call.
    #[inline]
    pub(crate) unsafe fn get_exclusive(&self) -> Result<T, RingError> {
        let read = self.cursors.claim_read().ok_or(Empty)?;
        let mut element = MaybeUninit::<T>::uninit();
        self.region
            .read_at(read, element.as_mut_ptr() as *mut u8, mem::size_of::<T>());
        self.cursors.commit_read(read);
        Ok(element.assume_init())
    }

    /// # Safety
    /// The caller must be the only consumer for the duration of the call.
    #[inline]
    pub(crate) unsafe fn reset_exclusive(&self) {
        self.cursors.reset();
    }

    #[cfg(test)]
    pub(crate) fn positions(&self) -> (usize, usize) {
        self.cursors.positions()
    }
}
