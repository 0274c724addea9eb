//! Raw interface to the kernel's `FS_IOC_FIEMAP` ioctl.
//!
//! The ioctl takes a fixed header immediately followed by a caller-sized
//! array of extent records. Issued with a capacity of zero it only reports
//! how many extents the file has, which [`probe`] uses so that
//! [`FiemapBuffer`] can size the real query.

use std::fs::File;
use std::mem;
use std::os::unix::io::AsRawFd;
use std::slice;

use log::debug;
use nix::errno::Errno;
use nix::ioctl_readwrite;

pub const FIEMAP_MAX_OFFSET: u64 = u64::MAX;

pub const FIEMAP_FLAG_SYNC: u32 = 0x0000_0001;

pub const FIEMAP_EXTENT_LAST: u32 = 0x0000_0001;
pub const FIEMAP_EXTENT_UNKNOWN: u32 = 0x0000_0002;
pub const FIEMAP_EXTENT_DELALLOC: u32 = 0x0000_0004;
pub const FIEMAP_EXTENT_ENCODED: u32 = 0x0000_0008;
pub const FIEMAP_EXTENT_NOT_ALIGNED: u32 = 0x0000_0100;
pub const FIEMAP_EXTENT_DATA_INLINE: u32 = 0x0000_0200;
pub const FIEMAP_EXTENT_DATA_TAIL: u32 = 0x0000_0400;
pub const FIEMAP_EXTENT_UNWRITTEN: u32 = 0x0000_0800;
pub const FIEMAP_EXTENT_MERGED: u32 = 0x0000_1000;

/// `struct fiemap` from `<linux/fiemap.h>`, minus its flexible array member.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FiemapHeader {
    pub fm_start: u64,
    pub fm_length: u64,
    pub fm_flags: u32,
    pub fm_mapped_extents: u32,
    pub fm_extent_count: u32,
    fm_reserved: u32,
}

/// `struct fiemap_extent` from `<linux/fiemap.h>`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FiemapExtent {
    pub fe_logical: u64,
    pub fe_physical: u64,
    pub fe_length: u64,
    pub fe_reserved64: [u64; 2],
    pub fe_flags: u32,
    pub fe_reserved: [u32; 3],
}

// FS_IOC_FIEMAP = _IOWR('f', 11, struct fiemap)
ioctl_readwrite!(fs_ioc_fiemap, b'f', 11, FiemapHeader);

/// Failure modes of a sized extent query.
#[derive(Debug)]
pub enum QueryError {
    /// The ioctl itself failed.
    Ioctl(Errno),
    /// The kernel filled every slot we offered, so the file gained extents
    /// between the probe and the real query (it is being written to).
    Truncated,
}

fn header(flags: u32, extent_count: u32) -> FiemapHeader {
    FiemapHeader {
        fm_start: 0,
        fm_length: FIEMAP_MAX_OFFSET,
        fm_flags: flags,
        fm_mapped_extents: 0,
        fm_extent_count: extent_count,
        fm_reserved: 0,
    }
}

fn query_flags(sync: bool) -> u32 {
    if sync {
        FIEMAP_FLAG_SYNC
    } else {
        0
    }
}

/// Issue a zero-capacity query to learn how many extents a file has.
pub fn probe(file: &File, sync: bool) -> Result<u32, Errno> {
    let mut hdr = header(query_flags(sync), 0);
    unsafe { fs_ioc_fiemap(file.as_raw_fd(), &mut hdr) }?;
    Ok(hdr.fm_mapped_extents)
}

// The buffer is addressed in u64 words so that the header and extent
// records are always sufficiently aligned.
const HEADER_WORDS: usize = mem::size_of::<FiemapHeader>() / 8;
const EXTENT_WORDS: usize = mem::size_of::<FiemapExtent>() / 8;

/// Capacity granularity, in extent slots.
const CAPACITY_STEP: u32 = 256;

/// A reusable result buffer for sized FIEMAP queries.
///
/// Grows on demand and never shrinks, so one buffer amortises allocation
/// across every file of a scan. Capacity is always kept strictly above the
/// probed extent count: if the kernel then maps exactly `capacity` extents,
/// the file must have grown between the two queries.
pub struct FiemapBuffer {
    words: Vec<u64>,
    capacity: u32,
}

impl FiemapBuffer {
    pub fn new() -> Self {
        FiemapBuffer {
            words: Vec::new(),
            capacity: 0,
        }
    }

    /// Capacity in extent slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Grow (never shrink) to hold strictly more than `probed` extents,
    /// rounded up to the capacity granularity.
    pub fn reserve_for(&mut self, probed: u32) {
        if probed < self.capacity {
            return;
        }
        let target = (probed + 1).next_multiple_of(CAPACITY_STEP);
        debug!(
            "growing extent buffer from {} to {} slots",
            self.capacity, target
        );
        self.words
            .resize(HEADER_WORDS + target as usize * EXTENT_WORDS, 0);
        self.capacity = target;
    }

    /// Issue the real, sized query and return the mapped extents.
    ///
    /// [`reserve_for`](Self::reserve_for) must have been called first with
    /// the probed extent count.
    pub fn query(&mut self, file: &File, sync: bool) -> Result<&[FiemapExtent], QueryError> {
        if self.capacity == 0 {
            self.reserve_for(0);
        }
        self.words.fill(0);

        let base = self.words.as_mut_ptr() as *mut FiemapHeader;
        let mapped = unsafe {
            base.write(header(query_flags(sync), self.capacity));
            fs_ioc_fiemap(file.as_raw_fd(), base).map_err(QueryError::Ioctl)?;
            (*base).fm_mapped_extents
        };

        if mapped >= self.capacity {
            return Err(QueryError::Truncated);
        }

        let extents = unsafe {
            slice::from_raw_parts(
                self.words.as_ptr().add(HEADER_WORDS) as *const FiemapExtent,
                mapped as usize,
            )
        };
        Ok(extents)
    }
}

impl Default for FiemapBuffer {
    fn default() -> Self {
        Self::new()
    }
}
