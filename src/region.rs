//! The `region` module owns the memory behind a ring.
//!
//! A [`Mapping::Mirrored`] region maps a single backing object twice, back to back, so that
//! bytes `[length, 2 * length)` alias bytes `[0, length)`. Any element-sized access starting
//! inside the first half is then one contiguous copy, even when it crosses the end of the ring.
//!
//! A [`Mapping::Split`] region is a plain anonymous mapping of `length` bytes which splits
//! copies at the wrap boundary. It is used where double mapping is not available.

use memmap2::MmapMut;
use std::ptr::{self, NonNull};

use crate::ring::RingError;
use crate::ring::RingError::*;

/// Memory layout used to back a ring
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mapping {
    /// One backing object mapped twice into adjacent address ranges
    Mirrored,
    /// Single anonymous mapping, copies are split at the wrap boundary
    Split,
}

impl Default for Mapping {
    #[cfg(unix)]
    fn default() -> Self {
        Mapping::Mirrored
    }

    #[cfg(not(unix))]
    fn default() -> Self {
        Mapping::Split
    }
}

/// Granularity used when the platform cannot be queried
#[cfg(not(unix))]
const FALLBACK_GRANULARITY: usize = 64 * 1024;

/// Allocation granularity of the platform in bytes
#[cfg(unix)]
pub(crate) fn allocation_granularity() -> Result<usize, RingError> {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => Ok(size as usize),
        _ => Err(FailedReserve(std::io::Error::last_os_error())),
    }
}

#[cfg(not(unix))]
pub(crate) fn allocation_granularity() -> Result<usize, RingError> {
    Ok(FALLBACK_GRANULARITY)
}

/// Backing memory of a ring, `length` bytes addressable with wraparound
pub(crate) enum Region {
    #[cfg(unix)]
    Mirrored(mirror::MirroredRegion),
    Split(SplitRegion),
}

impl Region {
    /// Map a new region of exactly `length` bytes, which must be a multiple of
    /// [`allocation_granularity`]
    pub(crate) fn new(length: usize, mapping: Mapping) -> Result<Region, RingError> {
        match mapping {
            #[cfg(unix)]
            Mapping::Mirrored => Ok(Region::Mirrored(mirror::MirroredRegion::new(length)?)),
            #[cfg(not(unix))]
            Mapping::Mirrored => Err(FailedMap(std::io::Error::from(
                std::io::ErrorKind::Unsupported,
            ))),
            Mapping::Split => Ok(Region::Split(SplitRegion::new(length)?)),
        }
    }

    #[inline]
    pub(crate) fn mapping(&self) -> Mapping {
        match self {
            #[cfg(unix)]
            Region::Mirrored(_) => Mapping::Mirrored,
            Region::Split(_) => Mapping::Split,
        }
    }

    /// Copy `len` bytes from `src` into the region starting at `offset`, wrapping past the end.
    ///
    /// # Safety
    /// `offset < length`, `len <= length` and `src` is valid for `len` bytes. No other thread
    /// may access the target bytes for the duration of the call.
    #[inline]
    pub(crate) unsafe fn write_at(&self, offset: usize, src: *const u8, len: usize) {
        match self {
            #[cfg(unix)]
            Region::Mirrored(region) => {
                ptr::copy_nonoverlapping(src, region.as_ptr().add(offset), len)
            }
            Region::Split(region) => {
                let first = (region.length - offset).min(len);
                ptr::copy_nonoverlapping(src, region.as_ptr().add(offset), first);
                ptr::copy_nonoverlapping(src.add(first), region.as_ptr(), len - first);
            }
        }
    }

    /// Copy `len` bytes starting at `offset`, wrapping past the end, into `dst`.
    ///
    /// # Safety
    /// `offset < length`, `len <= length` and `dst` is valid for `len` bytes. No other thread
    /// may write the source bytes for the duration of the call.
    #[inline]
    pub(crate) unsafe fn read_at(&self, offset: usize, dst: *mut u8, len: usize) {
        match self {
            #[cfg(unix)]
            Region::Mirrored(region) => {
                ptr::copy_nonoverlapping(region.as_ptr().add(offset), dst, len)
            }
            Region::Split(region) => {
                let first = (region.length - offset).min(len);
                ptr::copy_nonoverlapping(region.as_ptr().add(offset), dst, first);
                ptr::copy_nonoverlapping(region.as_ptr(), dst.add(first), len - first);
            }
        }
    }
}

/// Anonymous mapping of `length` bytes without a mirror
pub(crate) struct SplitRegion {
    /// Keeps the mapping alive, unmapped on drop
    _mmap: MmapMut,
    ptr: NonNull<u8>,
    length: usize,
}

impl SplitRegion {
    fn new(length: usize) -> Result<SplitRegion, RingError> {
        let mut mmap = MmapMut::map_anon(length).map_err(FailedMap)?;
        let ptr = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| {
            FailedMap(std::io::Error::from(std::io::ErrorKind::InvalidData))
        })?;
        tracing::debug!(length, "mapped split ring region");
        Ok(SplitRegion {
            _mmap: mmap,
            ptr,
            length,
        })
    }

    #[inline]
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

#[cfg(unix)]
pub(crate) mod mirror {
    use nix::sys::mman::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};
    use std::ffi::c_void;
    use std::fs::File;
    use std::io;
    use std::num::NonZeroUsize;
    use std::ptr::NonNull;

    use crate::ring::RingError;
    use crate::ring::RingError::*;

    /// One shared backing object of `length` bytes mapped at `base` and at `base + length`
    pub(crate) struct MirroredRegion {
        base: NonNull<c_void>,
        length: usize,
        /// Backing object, closed on drop after both views are unmapped
        backing: File,
    }

    impl MirroredRegion {
        pub(crate) fn new(length: usize) -> Result<MirroredRegion, RingError> {
            let view_len = NonZeroUsize::new(length)
                .ok_or_else(|| FailedReserve(io::Error::from(io::ErrorKind::InvalidInput)))?;
            let total_len = length
                .checked_mul(2)
                .and_then(NonZeroUsize::new)
                .ok_or_else(|| FailedReserve(io::Error::from(io::ErrorKind::OutOfMemory)))?;

            let backing = backing_object(length)?;

            // Reserve `2 * length` bytes of address space. The reservation is overlaid with
            // MAP_FIXED below rather than released, so the range cannot be claimed in between.
            let base = unsafe {
                mmap_anonymous(None, total_len, ProtFlags::PROT_NONE, MapFlags::MAP_PRIVATE)
                    .map_err(|errno| FailedReserve(errno.into()))?
            };

            let region = MirroredRegion {
                base,
                length,
                backing,
            };

            // On error `region` is dropped, which unmaps the whole reserved range.
            for offset in [0, length] {
                let addr = NonZeroUsize::new(region.base.as_ptr() as usize + offset);
                unsafe {
                    mmap(
                        addr,
                        view_len,
                        ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                        MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
                        &region.backing,
                        0,
                    )
                    .map_err(|errno| FailedMap(errno.into()))?;
                }
            }

            tracing::debug!(
                base = ?region.base,
                length,
                "mapped mirrored ring region"
            );

            Ok(region)
        }

        #[inline]
        pub(crate) fn as_ptr(&self) -> *mut u8 {
            self.base.as_ptr() as *mut u8
        }
    }

    impl Drop for MirroredRegion {
        /// Unmaps both views, the backing object is closed afterwards
        fn drop(&mut self) {
            match unsafe { munmap(self.base, self.length * 2) } {
                Ok(()) => tracing::debug!(
                    base = ?self.base,
                    length = self.length,
                    "unmapped mirrored ring region"
                ),
                Err(errno) => tracing::warn!(
                    base = ?self.base,
                    %errno,
                    "failed to unmap mirrored ring region"
                ),
            }
        }
    }

    /// Create an anonymous shared memory object of `length` bytes
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn backing_object(length: usize) -> Result<File, RingError> {
        use nix::sys::memfd::{memfd_create, MemFdCreateFlag};

        let fd = memfd_create(c"mirror-ring", MemFdCreateFlag::MFD_CLOEXEC)
            .map_err(|errno| FailedBacking(errno.into()))?;
        let file = File::from(fd);
        file.set_len(length as u64).map_err(FailedBacking)?;
        Ok(file)
    }

    /// Create an unlinked temporary file of `length` bytes
    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    fn backing_object(length: usize) -> Result<File, RingError> {
        use std::fs::{self, OpenOptions};
        use std::os::unix::fs::OpenOptionsExt;
        use std::sync::atomic::{AtomicUsize, Ordering};

        static SEQ: AtomicUsize = AtomicUsize::new(0);

        let mut path = std::env::temp_dir();
        path.push(format!(
            "mirror-ring-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(FailedBacking)?;
        fs::remove_file(&path).map_err(FailedBacking)?;
        file.set_len(length as u64).map_err(FailedBacking)?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> usize {
        allocation_granularity().unwrap()
    }

    #[test]
    fn granularity_is_power_of_two() {
        assert!(page().is_power_of_two());
    }

    #[cfg(unix)]
    #[test]
    fn mirror_aliases_first_half() {
        let length = page();
        let region = mirror::MirroredRegion::new(length).unwrap();
        let base = region.as_ptr();

        unsafe {
            *base.add(3) = 0xAB;
            assert_eq!(*base.add(length + 3), 0xAB);

            *base.add(length + 7) = 0xCD;
            assert_eq!(*base.add(7), 0xCD);
        }
    }

    #[test]
    fn wrapped_copy_lands_at_start() {
        let length = page();
        let mappings: &[Mapping] = if cfg!(unix) {
            &[Mapping::Mirrored, Mapping::Split]
        } else {
            &[Mapping::Split]
        };

        for &mapping in mappings {
            let region = Region::new(length, mapping).unwrap();
            assert_eq!(region.mapping(), mapping);

            let src: Vec<u8> = (1..=16).collect();
            let mut dst = [0u8; 16];
            unsafe {
                region.write_at(length - 5, src.as_ptr(), src.len());
                region.read_at(length - 5, dst.as_mut_ptr(), dst.len());
            }
            assert_eq!(&dst[..], &src[..]);

            // the tail of the element must be visible at offset 0
            let mut head = [0u8; 11];
            unsafe { region.read_at(0, head.as_mut_ptr(), head.len()) };
            assert_eq!(&head[..], &src[5..]);
        }
    }

    /// Each region reserves 128 GiB of address space, so leaking the views of a few
    /// thousand regions exhausts a 47 or 48 bit user address space
    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn drop_releases_mappings() {
        let length = 1usize << 36;
        for _ in 0..4096 {
            let region = Region::new(length, Mapping::Mirrored).unwrap();
            drop(region);
        }
    }

    #[cfg(all(unix, target_pointer_width = "64"))]
    #[test]
    fn oversized_mirror_fails_to_reserve() {
        match mirror::MirroredRegion::new(1 << 63) {
            Err(RingError::FailedReserve(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::OutOfMemory)
            }
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("mapped 2^64 bytes"),
        }
    }
}
