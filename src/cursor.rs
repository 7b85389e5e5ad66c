use std::sync::atomic::{AtomicUsize, Ordering};

/// `Cursors` holds the `read` and `write` byte offsets of a ring.
///
/// Both offsets always lie in `[0, length)`. The buffer is empty iff they are equal,
/// and a deposit is rejected if it would make `write` reach or pass `read`.
pub(crate) struct Cursors {
    /// Next byte offset to read from, advanced only by the consumer side
    read: AtomicUsize,
    /// Next byte offset to write to, advanced only by the producer side
    write: AtomicUsize,
    /// Ring length in bytes
    length: usize,
    /// Element size in bytes
    granularity: usize,
}

impl Cursors {
    /// Create new `Cursors` with both offsets at zero
    pub(crate) fn new(length: usize, granularity: usize) -> Cursors {
        Cursors {
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            length,
            granularity,
        }
    }

    /// Producer side: returns the offset to write the next element at,
    /// or `None` when the ring is full
    #[inline]
    pub(crate) fn claim_write(&self) -> Option<usize> {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        if used(read, write, self.length) + self.granularity >= self.length {
            return None;
        }
        Some(write)
    }

    /// Producer side: publish the element written at `write`
    #[inline]
    pub(crate) fn commit_write(&self, write: usize) {
        self.write.store(
            advance(write, self.granularity, self.length),
            Ordering::Release,
        );
    }

    /// Consumer side: returns the offset of the oldest element,
    /// or `None` when the ring is empty
    #[inline]
    pub(crate) fn claim_read(&self) -> Option<usize> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        Some(read)
    }

    /// Consumer side: release the element read at `read`
    #[inline]
    pub(crate) fn commit_read(&self, read: usize) {
        self.read.store(
            advance(read, self.granularity, self.length),
            Ordering::Release,
        );
    }

    /// Consumer side: jump `read` forward to the producer's current position
    #[inline]
    pub(crate) fn reset(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.read.store(write, Ordering::Release);
    }

    #[inline]
    pub(crate) fn can_get(&self) -> bool {
        self.read.load(Ordering::Acquire) != self.write.load(Ordering::Acquire)
    }

    /// Number of bytes currently occupied
    #[inline]
    pub(crate) fn used(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        used(read, write, self.length)
    }

    #[cfg(test)]
    pub(crate) fn positions(&self) -> (usize, usize) {
        (
            self.read.load(Ordering::SeqCst),
            self.write.load(Ordering::SeqCst),
        )
    }
}

/// Move `pos` forward by `step` bytes and fold it back into `[0, length)`
#[inline]
pub(crate) fn advance(pos: usize, step: usize, length: usize) -> usize {
    let next = pos + step;
    if next >= length {
        next - length
    } else {
        next
    }
}

/// Occupied byte count between `read` and `write` modulo `length`
#[inline]
pub(crate) fn used(read: usize, write: usize, length: usize) -> usize {
    if write >= read {
        write - read
    } else {
        length - read + write
    }
}

/// Maximum number of live elements a ring of `length` bytes holds
#[inline]
pub(crate) fn max_elements(length: usize, granularity: usize) -> usize {
    (length - 1) / granularity
}
