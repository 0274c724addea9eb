//! End-to-end tests of the public pipeline: build a scan graph from raw
//! extent records, sort it, and derive the aggregate report — everything a
//! run does after traversal, with no dependence on a FIEMAP-capable
//! filesystem.

use std::collections::HashSet;

use filemap::fiemap::{FiemapExtent, FIEMAP_EXTENT_LAST};
use filemap::model::{InodeFlags, InodeMeta, ScanGraph};
use filemap::report::summarize;
use filemap::sort::{sort_extents, SortDirection, SortKey};
use filemap::FilemapError;

fn raw_extents(specs: &[(u64, u64)]) -> Vec<FiemapExtent> {
    specs
        .iter()
        .enumerate()
        .map(|(i, &(off, len))| FiemapExtent {
            fe_physical: off,
            fe_length: len,
            fe_flags: if i + 1 == specs.len() {
                FIEMAP_EXTENT_LAST
            } else {
                0
            },
            ..Default::default()
        })
        .collect()
}

fn meta(size: u64) -> InodeMeta {
    InodeMeta {
        mode: 0o100644,
        size,
        nlink: 1,
    }
}

/// A small synthetic volume: one contiguous file, one fragmented file, one
/// hardlinked file.
fn build_graph() -> ScanGraph {
    let mut graph = ScanGraph::new(4096);

    graph
        .register_inode(10, meta(8192), &raw_extents(&[(4096, 8192)]), "/a")
        .unwrap();
    graph.add_name(10, "/a", false);

    graph
        .register_inode(
            11,
            meta(12288),
            &raw_extents(&[(40960, 4096), (81920, 8192)]),
            "/b",
        )
        .unwrap();
    graph.add_name(11, "/b", false);

    graph
        .register_inode(12, meta(4096), &raw_extents(&[(20480, 4096)]), "/z/link2")
        .unwrap();
    graph.add_name(12, "/z/link2", false);
    // Second name discovered later for the same inode.
    assert!(graph.contains_inode(12));
    graph.add_name(12, "/z/link1", false);

    graph
}

#[test]
fn extcount_matches_attached_extents_with_contiguous_positions() {
    let graph = build_graph();

    for inode in graph.inodes.values() {
        let mut positions: Vec<u64> = graph
            .extents
            .iter()
            .filter(|e| e.ino == inode.ino)
            .map(|e| e.pos)
            .collect();
        positions.sort_unstable();

        assert_eq!(positions.len() as u64, inode.extcount);
        let expected: Vec<u64> = (1..=inode.extcount).collect();
        assert_eq!(positions, expected, "inode {}", inode.ino);
    }
}

#[test]
fn physical_offsets_are_unique_across_the_run() {
    let graph = build_graph();
    let offsets: HashSet<u64> = graph.extents.iter().map(|e| e.off).collect();
    assert_eq!(offsets.len(), graph.extents.len());
}

#[test]
fn offset_collision_across_inodes_aborts() {
    let mut graph = build_graph();
    let err = graph
        .register_inode(99, meta(4096), &raw_extents(&[(20480, 4096)]), "/clone")
        .unwrap_err();
    assert!(matches!(err, FilemapError::SharedExtent { offset: 20480, .. }));
}

#[test]
fn hardlinked_names_share_one_inode_and_one_extent_query() {
    let graph = build_graph();

    let inode = &graph.inodes[&12];
    assert_eq!(inode.name_count(), 2);
    assert_eq!(inode.names, vec!["/z/link1", "/z/link2"]);

    // One inode, one set of extents, two file names counted.
    assert_eq!(
        graph.extents.iter().filter(|e| e.ino == 12).count(),
        1
    );
    assert_eq!(graph.file_count, 4);
    assert_eq!(graph.inode_count(), 3);
}

#[test]
fn aggregates_reflect_the_fragmented_inode() {
    let graph = build_graph();

    let summary = summarize(&graph);
    assert_eq!(summary.fragmented_inodes, 1);
    assert_eq!(summary.fragmented_extents, 2);

    assert!(graph.inodes[&11].flags.contains(InodeFlags::FRAGMENTED));
    assert!(!graph.inodes[&11].flags.contains(InodeFlags::UNORDERED));
    assert!(graph.integral_blksz);
}

#[test]
fn sorted_output_is_total_and_reversible() {
    let mut graph = build_graph();

    sort_extents(
        &mut graph.extents,
        &graph.inodes,
        SortKey::Offset,
        SortDirection::Ascending,
    );
    let ascending: Vec<u64> = graph.extents.iter().map(|e| e.off).collect();
    assert_eq!(ascending, vec![4096, 20480, 40960, 81920]);

    sort_extents(
        &mut graph.extents,
        &graph.inodes,
        SortKey::Offset,
        SortDirection::Descending,
    );
    let mut descending: Vec<u64> = graph.extents.iter().map(|e| e.off).collect();
    descending.reverse();
    assert_eq!(ascending, descending);
}

#[test]
fn sort_by_first_name_groups_hardlinked_inode_by_earliest_name() {
    let mut graph = build_graph();

    sort_extents(
        &mut graph.extents,
        &graph.inodes,
        SortKey::FileName,
        SortDirection::Ascending,
    );
    let inos: Vec<u64> = graph.extents.iter().map(|e| e.ino).collect();
    // "/a" < "/b" < "/z/link1" (the hardlinked inode's first name).
    assert_eq!(inos, vec![10, 11, 11, 12]);
}

#[test]
fn raw_extent_records_are_fully_constructible() {
    // Callers outside the crate build these records field by field, the
    // reserved padding included.
    let fe = FiemapExtent {
        fe_logical: 0,
        fe_physical: 4096,
        fe_length: 4096,
        fe_reserved64: [0; 2],
        fe_flags: FIEMAP_EXTENT_LAST,
        fe_reserved: [0; 3],
    };
    assert_eq!(fe.fe_physical, 4096);
    assert_eq!(fe.fe_flags, FIEMAP_EXTENT_LAST);
}
