//! Directory traversal and extent acquisition.
//!
//! Single-threaded and fail-fast: traversal is depth-first in directory
//! entry order, extent acquisition for a file completes before the walk
//! moves to the next sibling, and the first error at any depth unwinds the
//! whole scan.

mod acquire;
mod walker;

use std::fmt;
use std::fs::File;
use std::io::{IsTerminal, Write};
use std::os::unix::fs::MetadataExt;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;

use crate::error::{FilemapError, Result};
use crate::fiemap::FiemapBuffer;
use crate::model::ScanGraph;

/// The options the scan itself branches on; presentation options stay in
/// the CLI layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Also submit each directory's own handle for extent mapping.
    pub scan_directories: bool,
    /// `fsync(2)` directories and pass `FIEMAP_FLAG_SYNC` on queries.
    pub sync_files: bool,
    /// Suppress the terminal progress line.
    pub quiet: bool,
}

/// Everything a running scan mutates: the graph under construction and the
/// reusable FIEMAP result buffer, plus the configuration it branches on.
pub struct ScanContext {
    pub opts: ScanOptions,
    pub graph: ScanGraph,
    pub buffer: FiemapBuffer,
}

impl ScanContext {
    fn new(opts: ScanOptions, blksz: u64) -> Self {
        ScanContext {
            opts,
            graph: ScanGraph::new(blksz),
            buffer: FiemapBuffer::new(),
        }
    }

    /// Overwrite the current progress line on stderr. Only emitted on a
    /// terminal, and never when running quietly.
    pub(crate) fn progress(&self, args: fmt::Arguments) {
        if self.opts.quiet {
            return;
        }
        let mut stderr = std::io::stderr();
        if stderr.is_terminal() {
            let _ = write!(stderr, "\x1b[2K\r{args}");
            let _ = stderr.flush();
        }
    }
}

/// Open flags used for every handle in the scan: read-only, refusing to
/// follow symlinks or to become a controlling terminal.
fn scan_oflags() -> OFlag {
    OFlag::O_RDONLY | OFlag::O_NOFOLLOW | OFlag::O_NOCTTY
}

/// Scan the tree (or single file) at `path` and return the finished graph.
///
/// The filesystem block size is taken from the root of the scan; the whole
/// run is judged against it.
pub fn run(path: &str, opts: ScanOptions) -> Result<ScanGraph> {
    let fd = open(path, scan_oflags(), Mode::empty())
        .map_err(|e| FilemapError::errno("open(2)", path, e))?;
    let file = File::from(fd);
    let md = file
        .metadata()
        .map_err(|e| FilemapError::io("fstat(2)", path, e))?;

    let mut ctx = ScanContext::new(opts, md.blksize());

    if md.is_dir() {
        walker::scan_directory(&mut ctx, file, &md, path)?;
    } else if md.is_file() {
        acquire::scan_extents(&mut ctx, file, &md, path)?;
    } else {
        return Err(FilemapError::NotFileOrDirectory {
            path: path.to_string(),
        });
    }

    Ok(ctx.graph)
}
