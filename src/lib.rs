//! `mirror-ring` is a fixed-capacity FIFO ring buffer of fixed-size elements for low-latency handoff between threads of one process.
//!
//! ## Features
//!
//! - **Mirrored mapping**: The backing memory is mapped twice into adjacent virtual address ranges, so an element that crosses the end of the ring is still copied in one contiguous `memcpy`. Where double mapping is unavailable, a conventional [`Mapping::Split`] ring with split copies is used instead.
//!
//! - **Exclusive access**: With exactly one producer and one consumer, [`MirroredRingBuffer::split`] returns a [`Producer`]/[`Consumer`] pair that hands off elements using atomic cursors only.
//!
//! - **Shared access**: [`MirroredRingBuffer::multi_deposit`] and [`MirroredRingBuffer::multi_get`] may be called from any number of threads; one lock serializes producers and another serializes consumers.
//!
//! No operation blocks: a deposit on a full ring fails with [`RingError::Full`] and a get on an empty ring with [`RingError::Empty`].
//!
//! ```
//! # use mirror_ring::{MirroredRingBuffer, RingError};
//! let mut ring = MirroredRingBuffer::<u64>::new(4096)?;
//! ring.deposit(&7)?;
//! assert_eq!(ring.get()?, 7);
//! assert!(matches!(ring.get(), Err(RingError::Empty)));
//! # Ok::<(), RingError>(())
//! ```
mod cursor;
pub mod handle;
mod locks;
pub mod region;
pub mod ring;

pub use handle::{Consumer, Producer};
pub use region::Mapping;
pub use ring::{MirroredRingBuffer, RingError};
