//! filemap — report the physical extent layout of files.
//!
//! Walks a directory tree (or takes a single file), queries the kernel's
//! `FS_IOC_FIEMAP` interface for every regular file it finds, and builds a
//! graph of inodes, extents, and the names that refer to them. The scan is
//! strictly read-only and fail-fast: any syscall error or inconsistent
//! extent data aborts the whole run rather than producing a misleading
//! fragmentation report.
//!
//! # Modules
//!
//! - [`model`] — the inode/extent graph and its registries.
//! - [`scan`] — directory traversal and extent acquisition.
//! - [`fiemap`] — the raw `FS_IOC_FIEMAP` interface and reusable buffer.
//! - [`sort`] — ordering of the collected extents for presentation.
//! - [`report`] — aggregate statistics and the extent table renderer.
//! - [`cli`] — command-line options and cross-option validation.

pub mod cli;
pub mod error;
pub mod fiemap;
pub mod model;
pub mod report;
pub mod scan;
pub mod sort;

pub use error::{FilemapError, Result};
