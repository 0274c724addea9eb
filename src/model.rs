//! The inode/extent/name graph built by a scan.
//!
//! All run-wide state — the inode and extent registries, the counters,
//! the block-alignment indicator — lives in one [`ScanGraph`] owned by
//! the scan context, so a run (or a test) starts from a clean slate
//! without any global reset.

use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

use bitflags::bitflags;

use crate::error::{FilemapError, Result};
use crate::fiemap::{FiemapExtent, FIEMAP_EXTENT_LAST};

bitflags! {
    /// Flags derived for an inode from the layout of its extents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InodeFlags: u32 {
        /// A gap or reordering was observed between consecutive extents.
        const FRAGMENTED = 0x01;
        /// A later extent physically precedes an earlier one.
        const UNORDERED = 0x02;
        /// Some extent's offset or length is not a multiple of the
        /// filesystem block size.
        const UNALIGNED = 0x04;
    }
}

/// One contiguous physical storage region backing part of a file.
///
/// Never mutated after registration. The back-reference to the owning
/// inode is its inode number, resolved through [`ScanGraph::inodes`].
#[derive(Debug, Clone)]
pub struct Extent {
    /// Physical offset in bytes; globally unique across the whole run.
    pub off: u64,
    /// Length in bytes.
    pub len: u64,
    /// 1-based position within the owning inode's extent list.
    pub pos: u64,
    /// Raw kernel extent flags.
    pub flags: u32,
    /// Owning inode number.
    pub ino: u64,
}

/// Metadata snapshot taken from the open handle at scan time.
#[derive(Debug, Clone, Copy)]
pub struct InodeMeta {
    pub mode: u32,
    pub size: u64,
    pub nlink: u64,
}

impl InodeMeta {
    pub fn from_metadata(md: &Metadata) -> Self {
        InodeMeta {
            mode: md.mode(),
            size: md.size(),
            nlink: md.nlink(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }
}

/// A unique file-content object and every name observed for it.
#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: u64,
    pub meta: InodeMeta,
    /// Number of extents attached to this inode.
    pub extcount: u64,
    /// Paths referring to this inode, in ascending lexicographic order.
    pub names: Vec<String>,
    pub flags: InodeFlags,
}

impl Inode {
    /// Number of names (hardlinks) observed for this inode during the scan.
    pub fn name_count(&self) -> u64 {
        self.names.len() as u64
    }

    /// The lexicographically-first name, used for name-based ordering.
    pub fn first_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }
}

/// The complete scan result: registries, extents, and counters.
#[derive(Debug)]
pub struct ScanGraph {
    /// Inode registry, keyed by inode number. Deduplicates hardlinks.
    pub inodes: HashMap<u64, Inode>,
    /// Every registered extent, in discovery order until sorted.
    pub extents: Vec<Extent>,
    /// Filesystem block size of the scan root, in bytes.
    pub blksz: u64,
    /// True while every observed extent offset and length is a multiple of
    /// the block size. One-way: once false, stays false.
    pub integral_blksz: bool,
    /// Regular-file names scanned (hardlinked names count separately).
    pub file_count: u64,
    /// Directory names scanned.
    pub dir_count: u64,
    /// Extent registry, keyed by physical offset. Detects shared extents.
    claimed_offsets: HashSet<u64>,
}

impl ScanGraph {
    pub fn new(blksz: u64) -> Self {
        ScanGraph {
            inodes: HashMap::new(),
            extents: Vec::new(),
            blksz,
            integral_blksz: true,
            file_count: 0,
            dir_count: 0,
            claimed_offsets: HashSet::new(),
        }
    }

    pub fn inode_count(&self) -> u64 {
        self.inodes.len() as u64
    }

    pub fn extent_count(&self) -> u64 {
        self.extents.len() as u64
    }

    /// Whether extents have already been acquired for this inode number.
    /// Callers must not query the kernel again when this returns true.
    pub fn contains_inode(&self, ino: u64) -> bool {
        self.inodes.contains_key(&ino)
    }

    /// Register a newly mapped inode and its validated extent list.
    ///
    /// Rejects extents whose physical offset is already claimed by another
    /// inode (shared extents are unsupported) and extent lists where the
    /// kernel's last-extent flag is anywhere but the final position (the
    /// file changed mid-scan). Derives the inode's fragmentation flags by
    /// comparing each extent with its predecessor in return order.
    pub fn register_inode(
        &mut self,
        ino: u64,
        meta: InodeMeta,
        extents: &[FiemapExtent],
        path: &str,
    ) -> Result<()> {
        let mut inode = Inode {
            ino,
            meta,
            extcount: 0,
            names: Vec::new(),
            flags: InodeFlags::empty(),
        };

        for (idx, fe) in extents.iter().enumerate() {
            if self.claimed_offsets.contains(&fe.fe_physical) {
                return Err(FilemapError::SharedExtent {
                    path: path.to_string(),
                    offset: fe.fe_physical,
                });
            }

            // The last-extent flag must sit on the final position and
            // nowhere else; anything else means the file changed between
            // the probe and now.
            let has_last = fe.fe_flags & FIEMAP_EXTENT_LAST != 0;
            if has_last != (idx + 1 == extents.len()) {
                return Err(FilemapError::TruncatedExtents {
                    path: path.to_string(),
                });
            }

            if idx > 0 {
                let prev = &extents[idx - 1];
                if fe.fe_physical > prev.fe_physical + prev.fe_length {
                    inode.flags |= InodeFlags::FRAGMENTED;
                }
                if fe.fe_physical < prev.fe_physical {
                    inode.flags |= InodeFlags::FRAGMENTED | InodeFlags::UNORDERED;
                }
            }
            if fe.fe_physical % self.blksz != 0 || fe.fe_length % self.blksz != 0 {
                inode.flags |= InodeFlags::UNALIGNED;
                self.integral_blksz = false;
            }

            self.claimed_offsets.insert(fe.fe_physical);
            self.extents.push(Extent {
                off: fe.fe_physical,
                len: fe.fe_length,
                pos: (idx + 1) as u64,
                flags: fe.fe_flags,
                ino,
            });
            inode.extcount += 1;
        }

        self.inodes.insert(ino, inode);
        Ok(())
    }

    /// Record one name for an already-registered inode and bump the
    /// file/directory counters. Directory names carry a trailing slash
    /// (except the root itself); the name list stays sorted.
    pub fn add_name(&mut self, ino: u64, path: &str, is_dir: bool) {
        if is_dir {
            self.dir_count += 1;
        } else {
            self.file_count += 1;
        }

        let name = if is_dir && path != "/" {
            format!("{path}/")
        } else {
            path.to_string()
        };

        if let Some(inode) = self.inodes.get_mut(&ino) {
            inode.names.push(name);
            inode.names.sort();
        }
    }
}
