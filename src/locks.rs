//! Side locks for the shared discipline.
//!
//! # Safety
//! The ring's cursor protocol is only correct with a single producer and a single consumer in
//! flight. `SideLocks` provides that guarantee for `multi_deposit` and `multi_get` by serializing
//! each side on its own mutex. Producers never contend with consumers: the ordering between the
//! two sides is governed by the cursors alone.
//!
//! Note: mixing the locked methods with the exclusive ones is prevented by the borrow checker,
//! since exclusive access requires either `&mut` or a handle obtained by consuming the ring.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// One mutex per side of the ring.
pub(crate) struct SideLocks {
    producer: Mutex<()>,
    consumer: Mutex<()>,
}

impl SideLocks {
    pub(crate) fn new() -> Self {
        SideLocks {
            producer: Mutex::new(()),
            consumer: Mutex::new(()),
        }
    }

    /// Acquire the producer lock, held until the guard is dropped.
    #[inline]
    pub(crate) fn producer(&self) -> MutexGuard<'_, ()> {
        lock(&self.producer)
    }

    /// Acquire the consumer lock, held until the guard is dropped.
    #[inline]
    pub(crate) fn consumer(&self) -> MutexGuard<'_, ()> {
        lock(&self.consumer)
    }
}

/// The mutexes guard no data of their own and cursors are only published once a copy
/// completes, so a poisoned lock leaves the ring consistent.
#[inline]
fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
