//! Ordering of the collected extents for presentation.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{Extent, Inode};

/// Which attribute orders the extent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Physical offset of the extent.
    Offset,
    /// Length of the extent.
    Length,
    /// Number of extents belonging to the owning inode.
    ExtentCount,
    /// Number of names (hardlinks) observed for the owning inode.
    LinkCount,
    /// Owning inode number.
    InodeNumber,
    /// Size of the owning inode's file.
    FileSize,
    /// Lexicographically-first name of the owning inode (byte-wise).
    FileName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

fn compare(a: &Extent, b: &Extent, inodes: &HashMap<u64, Inode>, key: SortKey) -> Ordering {
    match key {
        SortKey::Offset => a.off.cmp(&b.off),
        SortKey::Length => a.len.cmp(&b.len),
        SortKey::ExtentCount => inodes[&a.ino].extcount.cmp(&inodes[&b.ino].extcount),
        SortKey::LinkCount => inodes[&a.ino].name_count().cmp(&inodes[&b.ino].name_count()),
        SortKey::InodeNumber => a.ino.cmp(&b.ino),
        SortKey::FileSize => inodes[&a.ino].meta.size.cmp(&inodes[&b.ino].meta.size),
        SortKey::FileName => inodes[&a.ino].first_name().cmp(inodes[&b.ino].first_name()),
    }
}

/// Sort the extent collection by `key` in `direction`.
///
/// Descending order inverts the ascending comparison; equal keys compare
/// equal either way, and the stable sort leaves ties in their prior order.
pub fn sort_extents(
    extents: &mut [Extent],
    inodes: &HashMap<u64, Inode>,
    key: SortKey,
    direction: SortDirection,
) {
    extents.sort_by(|a, b| {
        let ord = compare(a, b, inodes, key);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InodeFlags, InodeMeta};

    fn extent(off: u64, len: u64, pos: u64, ino: u64) -> Extent {
        Extent {
            off,
            len,
            pos,
            flags: 0,
            ino,
        }
    }

    fn inode(ino: u64, size: u64, names: &[&str], extcount: u64) -> Inode {
        Inode {
            ino,
            meta: InodeMeta {
                mode: 0o100644,
                size,
                nlink: 1,
            },
            extcount,
            names: names.iter().map(|n| n.to_string()).collect(),
            flags: InodeFlags::empty(),
        }
    }

    fn fixture() -> (Vec<Extent>, HashMap<u64, Inode>) {
        let mut inodes = HashMap::new();
        inodes.insert(1, inode(1, 500, &["/b"], 2));
        inodes.insert(2, inode(2, 100, &["/a", "/c"], 1));

        let extents = vec![
            extent(300, 50, 1, 1),
            extent(100, 200, 1, 2),
            extent(900, 10, 2, 1),
        ];
        (extents, inodes)
    }

    #[test]
    fn descending_offset_is_reverse_of_ascending() {
        let (mut asc, inodes) = fixture();
        sort_extents(&mut asc, &inodes, SortKey::Offset, SortDirection::Ascending);

        let (mut desc, _) = fixture();
        sort_extents(&mut desc, &inodes, SortKey::Offset, SortDirection::Descending);

        let asc_offs: Vec<u64> = asc.iter().map(|e| e.off).collect();
        let mut desc_offs: Vec<u64> = desc.iter().map(|e| e.off).collect();
        desc_offs.reverse();
        assert_eq!(asc_offs, vec![100, 300, 900]);
        assert_eq!(asc_offs, desc_offs);
    }

    #[test]
    fn equal_keys_keep_prior_order_in_both_directions() {
        let mut inodes = HashMap::new();
        inodes.insert(1, inode(1, 100, &["/a"], 3));
        let mut extents = vec![
            extent(10, 64, 1, 1),
            extent(20, 64, 2, 1),
            extent(30, 64, 3, 1),
        ];

        // All lengths equal: both passes must leave the order untouched.
        sort_extents(&mut extents, &inodes, SortKey::Length, SortDirection::Ascending);
        let after_asc: Vec<u64> = extents.iter().map(|e| e.off).collect();
        assert_eq!(after_asc, vec![10, 20, 30]);

        sort_extents(&mut extents, &inodes, SortKey::Length, SortDirection::Descending);
        let after_desc: Vec<u64> = extents.iter().map(|e| e.off).collect();
        assert_eq!(after_asc, after_desc);
    }

    #[test]
    fn filename_order_uses_first_name_bytewise() {
        let (mut extents, inodes) = fixture();
        sort_extents(&mut extents, &inodes, SortKey::FileName, SortDirection::Ascending);

        // Inode 2's first name "/a" precedes inode 1's "/b"; hardlink "/c"
        // does not participate.
        let inos: Vec<u64> = extents.iter().map(|e| e.ino).collect();
        assert_eq!(inos, vec![2, 1, 1]);
    }

    #[test]
    fn link_count_orders_by_observed_names() {
        let (mut extents, inodes) = fixture();
        sort_extents(&mut extents, &inodes, SortKey::LinkCount, SortDirection::Descending);
        assert_eq!(extents[0].ino, 2);
    }

    #[test]
    fn file_size_order() {
        let (mut extents, inodes) = fixture();
        sort_extents(&mut extents, &inodes, SortKey::FileSize, SortDirection::Ascending);
        let inos: Vec<u64> = extents.iter().map(|e| e.ino).collect();
        assert_eq!(inos, vec![2, 1, 1]);
    }
}
