//! Extent acquisition: one open file in, a registered inode out.
//!
//! The kernel does not say up front how many extents a file has, so each
//! new inode costs two queries: a zero-capacity probe for the count, then
//! the real query through the context's reusable buffer. Hardlinks to an
//! inode that is already registered skip both queries and only add a name.

use std::fs::{File, Metadata};
use std::os::unix::fs::MetadataExt;

use log::debug;

use crate::error::{FilemapError, Result};
use crate::fiemap::{self, QueryError};
use crate::model::InodeMeta;

use super::ScanContext;

/// Acquire and register the extents of the file open as `file`, then
/// record `path` as one of its names.
///
/// Consumes the handle and closes it on every exit path. Never retries:
/// any ioctl failure or inconsistent extent data aborts the run.
pub(super) fn scan_extents(
    ctx: &mut ScanContext,
    file: File,
    md: &Metadata,
    path: &str,
) -> Result<()> {
    ctx.progress(format_args!("mapping {path} ..."));

    let ino = md.ino();
    if !ctx.graph.contains_inode(ino) {
        let probed = fiemap::probe(&file, ctx.opts.sync_files)
            .map_err(|e| FilemapError::errno("ioctl(2) FS_IOC_FIEMAP", path, e))?;
        ctx.buffer.reserve_for(probed);

        let raw = ctx
            .buffer
            .query(&file, ctx.opts.sync_files)
            .map_err(|e| match e {
                QueryError::Ioctl(errno) => {
                    FilemapError::errno("ioctl(2) FS_IOC_FIEMAP", path, errno)
                }
                QueryError::Truncated => FilemapError::TruncatedExtents {
                    path: path.to_string(),
                },
            })?;
        debug!("{path}: inode {ino}: {} extents mapped", raw.len());

        ctx.graph
            .register_inode(ino, InodeMeta::from_metadata(md), raw, path)?;
    }

    ctx.graph.add_name(ino, path, md.is_dir());
    Ok(())
}
