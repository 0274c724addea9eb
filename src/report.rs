//! Aggregate statistics and the extent table renderer.
//!
//! Consumes the sorted graph; never mutates it. The "names already
//! printed" marker that abbreviates repeat hardlink listings is local
//! presentation state, not part of the scan result.

use std::collections::HashSet;
use std::io::{IsTerminal, Write};

use crate::cli::Options;
use crate::fiemap::{
    FIEMAP_EXTENT_DATA_INLINE, FIEMAP_EXTENT_DATA_TAIL, FIEMAP_EXTENT_DELALLOC,
    FIEMAP_EXTENT_ENCODED, FIEMAP_EXTENT_LAST, FIEMAP_EXTENT_MERGED, FIEMAP_EXTENT_NOT_ALIGNED,
    FIEMAP_EXTENT_UNKNOWN, FIEMAP_EXTENT_UNWRITTEN,
};
use crate::model::{Extent, Inode, InodeFlags, ScanGraph};

/// Fragmentation totals derived from the finished graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentationSummary {
    pub fragmented_inodes: u64,
    /// Extents belonging to fragmented inodes.
    pub fragmented_extents: u64,
}

pub fn summarize(graph: &ScanGraph) -> FragmentationSummary {
    let mut summary = FragmentationSummary {
        fragmented_inodes: 0,
        fragmented_extents: 0,
    };
    for inode in graph.inodes.values() {
        if inode.flags.contains(InodeFlags::FRAGMENTED) {
            summary.fragmented_inodes += 1;
            summary.fragmented_extents += inode.extcount;
        }
    }
    summary
}

const SUFFIXES: [&str; 6] = ["  B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Format a byte count in IEC units with two decimals.
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut suffix = 0;
    while value >= 1024.0 && suffix + 1 < SUFFIXES.len() {
        value /= 1024.0;
        suffix += 1;
    }
    format!("{:.2} {}", value, SUFFIXES[suffix])
}

/// One-letter flag summary for an inode, in the order A D F L M U.
fn inode_flag_letters(inode: &Inode) -> String {
    let mut out = String::new();
    if inode.flags.contains(InodeFlags::UNALIGNED) {
        out.push('A'); // data is not aligned
    }
    if inode.meta.is_dir() {
        out.push('D');
    }
    if inode.flags.contains(InodeFlags::FRAGMENTED) || inode.extcount != 1 {
        out.push('F'); // data is not one contiguous run
    }
    if inode.name_count() > 1 {
        out.push('L'); // hardlinks
    }
    if inode.extcount > 1 {
        out.push('M'); // multiple extents
    }
    if inode.flags.contains(InodeFlags::UNORDERED) {
        out.push('U');
    }
    out
}

/// One-letter flag summary for an extent, drawn from the kernel's flag
/// vocabulary plus 'C' for "data continues after this extent".
fn extent_flag_letters(extent: &Extent, inode: &Inode) -> String {
    let mut out = String::new();
    if extent.flags & FIEMAP_EXTENT_NOT_ALIGNED != 0 {
        out.push('A');
    }
    if inode.extcount > 1 && extent.pos != inode.extcount {
        out.push('C');
    }
    if extent.flags & FIEMAP_EXTENT_DELALLOC != 0 {
        out.push('D'); // delayed allocation
    }
    if extent.flags & FIEMAP_EXTENT_LAST != 0 {
        out.push('E');
    }
    if extent.flags & FIEMAP_EXTENT_DATA_INLINE != 0 {
        out.push('I'); // allocated inline, inside a metadata block
    }
    if extent.flags & FIEMAP_EXTENT_MERGED != 0 {
        out.push('M'); // pseudo extent merged from plain blocks
    }
    if extent.flags & FIEMAP_EXTENT_DATA_TAIL != 0 {
        out.push('T'); // tail-packed with data from other files
    }
    if extent.flags & FIEMAP_EXTENT_UNKNOWN != 0 {
        out.push('U'); // no storage allocated yet
    }
    if extent.flags & FIEMAP_EXTENT_UNWRITTEN != 0 {
        out.push('W'); // allocated but never initialised
    }
    if extent.flags & FIEMAP_EXTENT_ENCODED != 0 {
        out.push('X'); // compressed, encrypted, or otherwise encoded
    }
    out
}

/// Render an offset, length, or gap: human-readable when requested, in
/// block multiples while every extent is block-aligned, bytes otherwise.
fn scaled(value: u64, readable: bool, graph: &ScanGraph) -> String {
    if readable {
        human_size(value)
    } else if graph.integral_blksz {
        (value / graph.blksz).to_string()
    } else {
        value.to_string()
    }
}

fn clear_progress_line(quiet: bool) {
    if quiet {
        return;
    }
    let mut stderr = std::io::stderr();
    if stderr.is_terminal() {
        let _ = write!(stderr, "\x1b[2K\r");
        let _ = stderr.flush();
    }
}

fn print_preamble(graph: &ScanGraph, opts: &Options, summary: &FragmentationSummary) {
    // Unit legend only matters if any extent rows will follow.
    if !(opts.fragmented_only && summary.fragmented_inodes == 0) {
        let block_legend = format!(
            "multiples of filesystem blocks ({} bytes)",
            graph.blksz
        );

        let offsets = if opts.readable_offsets() {
            "human-readable units"
        } else if graph.integral_blksz {
            block_legend.as_str()
        } else {
            "bytes"
        };
        println!("Extent offsets are in ....... : {offsets}");

        let lengths = if opts.readable_lengths() {
            "human-readable units"
        } else if graph.integral_blksz {
            block_legend.as_str()
        } else {
            "bytes"
        };
        println!("Extent lengths are in ....... : {lengths}");

        let sizes = if opts.readable_sizes() {
            "human-readable units"
        } else {
            "bytes"
        };
        println!("File sizes are in ........... : {sizes}");
    }

    if opts.scan_directories {
        println!(
            "Mapped ...................... : {} files & {} dirs ({} inodes) consisting of {} extents",
            graph.file_count,
            graph.dir_count,
            graph.inode_count(),
            graph.extent_count()
        );
    } else {
        println!(
            "Mapped ...................... : {} files ({} inodes) consisting of {} extents",
            graph.file_count,
            graph.inode_count(),
            graph.extent_count()
        );
    }

    if summary.fragmented_inodes > 0 {
        let pcnt = 100.0 * summary.fragmented_inodes as f64 / graph.inode_count() as f64;
        let ratio = summary.fragmented_extents as f64 / summary.fragmented_inodes as f64;
        println!(
            "Fragmented inodes ........... : {}/{} ({:.2}%); average {:.2} extents per fragmented inode",
            summary.fragmented_inodes,
            graph.inode_count(),
            pcnt,
            ratio
        );
    }

    if opts.fragmented_only {
        let which = if opts.scan_directories {
            "files & dirs"
        } else {
            "files"
        };
        println!();
        if summary.fragmented_inodes > 0 {
            println!("Requested to show only fragmented {which}");
        } else {
            println!("Requested to show only fragmented {which}; however, there are none");
        }
    }
}

/// Print the full report for a finished, sorted graph to stdout.
pub fn print_report(graph: &ScanGraph, opts: &Options) {
    clear_progress_line(opts.quiet);

    if graph.extents.is_empty() {
        return;
    }

    let summary = summarize(graph);

    if !opts.skip_preamble {
        print_preamble(graph, opts, &summary);
    }
    if opts.fragmented_only && summary.fragmented_inodes == 0 {
        return;
    }

    println!();
    println!(
        "{:>20} {:>20} {:>12} {:>12} {:>12} {:>12} {:>20}    {}",
        "Extent Offset",
        "Extent Length",
        "Extent Count",
        "Extent Flags",
        "Inode Number",
        "Inode Flags",
        "File Size",
        "File Name(s)"
    );
    println!(
        "-------------------- -------------------- ------------ ------------ \
         ------------ ------------ --------------------    ------------"
    );
    println!();

    let mut printed: HashSet<u64> = HashSet::new();
    let mut prev_end: Option<u64> = None;

    for extent in &graph.extents {
        let inode = &graph.inodes[&extent.ino];
        if opts.fragmented_only && !inode.flags.contains(InodeFlags::FRAGMENTED) {
            continue;
        }

        if opts.print_gaps {
            if let Some(end) = prev_end {
                let gap = extent.off.saturating_sub(end);
                if gap > 0 {
                    println!(
                        "{:>20} {:>20}",
                        "(gap)",
                        scaled(gap, opts.readable_gaps(), graph)
                    );
                }
            }
            prev_end = Some(extent.off + extent.len);
        }

        for (idx, name) in inode.names.iter().enumerate() {
            if idx == 0 {
                // Full details against the first name pointing to this inode.
                println!(
                    "{:>20} {:>20} {:>12} {:>12} {:>12} {:>12} {:>20}    {}",
                    scaled(extent.off, opts.readable_offsets(), graph),
                    scaled(extent.len, opts.readable_lengths(), graph),
                    format!("{}/{}", extent.pos, inode.extcount),
                    extent_flag_letters(extent, inode),
                    extent.ino,
                    inode_flag_letters(inode),
                    if opts.readable_sizes() {
                        human_size(inode.meta.size)
                    } else {
                        inode.meta.size.to_string()
                    },
                    name
                );
            } else if !printed.contains(&extent.ino) {
                // Remaining hardlink names, once per inode.
                println!(
                    "{:>20} {:>20} {:>12} {:>12} {:>12} {:>12} {:>20}    {}",
                    "----", "----", "----", "----", "----", "----", "----", name
                );
            } else {
                // Names were already listed against an earlier extent.
                println!(
                    "{:>20} {:>20} {:>12} {:>12} {:>12} {:>12} {:>20}    {}",
                    "++++", "++++", "++++", "++++", "++++", "++++", "++++", "++++"
                );
                break;
            }
        }

        printed.insert(extent.ino);
    }
}
