//! Race-safe recursive directory traversal.
//!
//! Every entry is opened with `O_NOFOLLOW | O_NOCTTY` and then re-statted
//! through the open handle; a device number that differs from the parent's
//! means a symlink was swapped in under us or a mount boundary was crossed,
//! and the entry is skipped. Ownership of each handle moves into the
//! recursive call that processes it, so closing on every exit path is
//! structural rather than a convention.

use std::fs::{File, Metadata};
use std::os::fd::AsFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;

use log::debug;
use nix::dir::Dir;
use nix::fcntl::{openat, AtFlags};
use nix::sys::stat::{fstatat, Mode};

use crate::error::{FilemapError, Result};

use super::{acquire, scan_oflags, ScanContext};

/// Only regular files and directories are scanned; everything else
/// (symlinks, fifos, sockets, devices) is skipped.
fn wanted_entry(mode: libc::mode_t) -> bool {
    matches!(mode & libc::S_IFMT, libc::S_IFREG | libc::S_IFDIR)
}

/// Build the path of a directory entry. Only the root keeps its trailing
/// slash, so joining never doubles one.
fn join_entry_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Recursively scan the directory open as `dir`, forwarding regular files
/// (and, when configured, the directory itself) to extent acquisition.
///
/// Takes ownership of `dir` and closes it on every exit path. Any syscall
/// failure aborts the entire traversal.
pub(super) fn scan_directory(
    ctx: &mut ScanContext,
    dir: File,
    md: &Metadata,
    path: &str,
) -> Result<()> {
    ctx.progress(format_args!("scanning {path} ..."));

    if ctx.opts.sync_files {
        dir.sync_all()
            .map_err(|e| FilemapError::io("fsync(2)", path, e))?;
    }

    // The Dir iterator wants ownership of a descriptor, but we still need
    // ours for openat(2) and possibly for mapping the directory itself.
    let dup = dir
        .as_fd()
        .try_clone_to_owned()
        .map_err(|e| FilemapError::io("dup(2)", path, e))?;
    let mut entries =
        Dir::from_fd(dup).map_err(|e| FilemapError::errno("fdopendir(3)", path, e))?;

    for entry in entries.iter() {
        ctx.progress(format_args!("walking {path} ..."));

        let entry = entry.map_err(|e| FilemapError::errno("readdir(3)", path, e))?;
        let name_bytes = entry.file_name().to_bytes();
        if name_bytes == b"." || name_bytes == b".." {
            continue;
        }
        let name = std::ffi::OsStr::from_bytes(name_bytes);
        let entpath = join_entry_path(path, &name.to_string_lossy());

        // Pre-open stat, relative to our handle and without following
        // symlinks.
        let pre = fstatat(&dir, name, AtFlags::AT_SYMLINK_NOFOLLOW)
            .map_err(|e| FilemapError::errno("fstatat(2)", &entpath, e))?;
        if pre.st_dev != md.dev() {
            // Not on the same filesystem.
            continue;
        }
        if !wanted_entry(pre.st_mode) {
            continue;
        }

        let efd = openat(&dir, name, scan_oflags(), Mode::empty())
            .map_err(|e| FilemapError::errno("openat(2)", &entpath, e))?;
        let efile = File::from(efd);

        // Re-stat through the open handle and compare devices again. This
        // closes the window between the stat above and the open: if a
        // symlink race or mount swapped the entry out, the device no
        // longer matches and the entry is skipped, not scanned.
        let emd = efile
            .metadata()
            .map_err(|e| FilemapError::io("fstat(2)", &entpath, e))?;
        if emd.dev() != md.dev() || emd.dev() != pre.st_dev {
            debug!("{entpath}: device changed between stat and open, skipping");
            continue;
        }

        if emd.is_dir() {
            // The recursive call owns efile and closes it.
            scan_directory(ctx, efile, &emd, &entpath)?;
        } else if emd.is_file() {
            acquire::scan_extents(ctx, efile, &emd, &entpath)?;
        }
        // Anything else: efile drops here, closing the descriptor.
    }

    if ctx.opts.scan_directories {
        // Directory metadata occupies extents on some filesystems too.
        // scan_extents consumes (and closes) our handle.
        acquire::scan_extents(ctx, dir, md, path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_slash_separated() {
        assert_eq!(join_entry_path("/srv/data", "file"), "/srv/data/file");
        assert_eq!(join_entry_path("data", "file"), "data/file");
    }

    #[test]
    fn join_does_not_double_the_root_slash() {
        assert_eq!(join_entry_path("/", "etc"), "/etc");
    }

    #[test]
    fn only_files_and_directories_are_wanted() {
        assert!(wanted_entry(libc::S_IFREG | 0o644));
        assert!(wanted_entry(libc::S_IFDIR | 0o755));

        assert!(!wanted_entry(libc::S_IFLNK | 0o777));
        assert!(!wanted_entry(libc::S_IFIFO | 0o600));
        assert!(!wanted_entry(libc::S_IFSOCK | 0o600));
        assert!(!wanted_entry(libc::S_IFCHR | 0o600));
        assert!(!wanted_entry(libc::S_IFBLK | 0o600));
    }
}
