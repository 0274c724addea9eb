//! Command-line options and cross-option validation.
//!
//! Defaults match a plain volume listing: ascending order by physical
//! extent offset, regular files only, raw byte/block units.

use clap::{ArgGroup, Parser};

use crate::error::{FilemapError, Result};
use crate::scan::ScanOptions;
use crate::sort::{SortDirection, SortKey};

#[derive(Parser, Debug, Clone)]
#[command(name = "filemap", version, about = "Report the physical extent layout of files")]
#[command(group(ArgGroup::new("direction").args(["sort_ascending", "sort_descending"])))]
#[command(group(ArgGroup::new("order").args([
    "order_offset",
    "order_length",
    "order_count",
    "order_links",
    "order_inum",
    "order_filesize",
    "order_filename",
])))]
pub struct Options {
    /// Display extents in ascending order (default)
    #[arg(short = 'A', long)]
    pub sort_ascending: bool,

    /// Display extents in descending order
    #[arg(short = 'D', long)]
    pub sort_descending: bool,

    /// Order extents by physical offset (default)
    #[arg(short = 'O', long)]
    pub order_offset: bool,

    /// Order extents by physical length
    #[arg(short = 'L', long)]
    pub order_length: bool,

    /// Order extents by the owning inode's number of extents
    #[arg(short = 'C', long)]
    pub order_count: bool,

    /// Order extents by the owning inode's number of hardlinks
    #[arg(short = 'H', long)]
    pub order_links: bool,

    /// Order extents by inode number
    #[arg(short = 'N', long)]
    pub order_inum: bool,

    /// Order extents by file size
    #[arg(short = 'S', long)]
    pub order_filesize: bool,

    /// Order extents by the alphabetically-first file name
    #[arg(short = 'F', long)]
    pub order_filename: bool,

    /// Scan the extents that belong to directories as well as regular files
    #[arg(short = 'd', long)]
    pub scan_directories: bool,

    /// Print fragmented files only
    #[arg(short = 'f', long)]
    pub fragmented_only: bool,

    /// Print the gaps between extents (needs ascending offset order,
    /// incompatible with --fragmented-only)
    #[arg(short = 'g', long)]
    pub print_gaps: bool,

    /// Don't print the action being performed
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Skip the informational lines printed before the table of extents
    #[arg(short = 'x', long)]
    pub skip_preamble: bool,

    /// Invoke fsync(2) on everything being scanned before scanning it
    #[arg(short = 'y', long)]
    pub sync_files: bool,

    /// Print human-readable extent offsets
    #[arg(short = 'o', long)]
    pub readable_offsets: bool,

    /// Print human-readable extent lengths
    #[arg(short = 'l', long)]
    pub readable_lengths: bool,

    /// Print human-readable file sizes
    #[arg(short = 's', long)]
    pub readable_sizes: bool,

    /// Print human-readable extent gaps
    #[arg(short = 't', long)]
    pub readable_gaps: bool,

    /// Short-hand for -o -l -s -t
    #[arg(short = 'r', long)]
    pub readable_all: bool,

    /// File or directory to scan
    #[arg(value_name = "PATH")]
    pub path: String,
}

impl Options {
    pub fn sort_direction(&self) -> SortDirection {
        if self.sort_descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn sort_key(&self) -> SortKey {
        if self.order_length {
            SortKey::Length
        } else if self.order_count {
            SortKey::ExtentCount
        } else if self.order_links {
            SortKey::LinkCount
        } else if self.order_inum {
            SortKey::InodeNumber
        } else if self.order_filesize {
            SortKey::FileSize
        } else if self.order_filename {
            SortKey::FileName
        } else {
            SortKey::Offset
        }
    }

    pub fn readable_offsets(&self) -> bool {
        self.readable_offsets || self.readable_all
    }

    pub fn readable_lengths(&self) -> bool {
        self.readable_lengths || self.readable_all
    }

    pub fn readable_sizes(&self) -> bool {
        self.readable_sizes || self.readable_all
    }

    pub fn readable_gaps(&self) -> bool {
        self.readable_gaps || self.readable_all
    }

    /// The subset of options the scan itself branches on.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            scan_directories: self.scan_directories,
            sync_files: self.sync_files,
            quiet: self.quiet,
        }
    }

    /// Reject conflicting option combinations before any scanning begins.
    ///
    /// Gap output only makes sense between physically consecutive rows, so
    /// it requires ascending offset order and a table with no rows held
    /// back.
    pub fn validate(&self) -> Result<()> {
        if self.print_gaps {
            if self.sort_descending || self.sort_key() != SortKey::Offset {
                return Err(FilemapError::InvalidOptions(
                    "--print-gaps requires ascending extent-offset order".to_string(),
                ));
            }
            if self.fragmented_only {
                return Err(FilemapError::InvalidOptions(
                    "--print-gaps is incompatible with --fragmented-only".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        Options::try_parse_from(args).expect("parse failed")
    }

    #[test]
    fn defaults_are_ascending_offset() {
        let opts = parse(&["filemap", "/mnt"]);
        assert_eq!(opts.sort_direction(), SortDirection::Ascending);
        assert_eq!(opts.sort_key(), SortKey::Offset);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.path, "/mnt");
    }

    #[test]
    fn order_flags_map_to_sort_keys() {
        assert_eq!(parse(&["filemap", "-L", "/m"]).sort_key(), SortKey::Length);
        assert_eq!(parse(&["filemap", "-C", "/m"]).sort_key(), SortKey::ExtentCount);
        assert_eq!(parse(&["filemap", "-H", "/m"]).sort_key(), SortKey::LinkCount);
        assert_eq!(parse(&["filemap", "-N", "/m"]).sort_key(), SortKey::InodeNumber);
        assert_eq!(parse(&["filemap", "-S", "/m"]).sort_key(), SortKey::FileSize);
        assert_eq!(parse(&["filemap", "-F", "/m"]).sort_key(), SortKey::FileName);
    }

    #[test]
    fn conflicting_order_flags_are_rejected_at_parse() {
        assert!(Options::try_parse_from(["filemap", "-O", "-L", "/m"]).is_err());
        assert!(Options::try_parse_from(["filemap", "-A", "-D", "/m"]).is_err());
    }

    #[test]
    fn print_gaps_needs_ascending_offset_order() {
        assert!(parse(&["filemap", "-g", "/m"]).validate().is_ok());
        assert!(parse(&["filemap", "-g", "-D", "/m"]).validate().is_err());
        assert!(parse(&["filemap", "-g", "-L", "/m"]).validate().is_err());
        assert!(parse(&["filemap", "-g", "-f", "/m"]).validate().is_err());
    }

    #[test]
    fn readable_all_implies_every_readable_flag() {
        let opts = parse(&["filemap", "-r", "/m"]);
        assert!(opts.readable_offsets());
        assert!(opts.readable_lengths());
        assert!(opts.readable_sizes());
        assert!(opts.readable_gaps());

        let opts = parse(&["filemap", "-o", "/m"]);
        assert!(opts.readable_offsets());
        assert!(!opts.readable_lengths());
    }

    #[test]
    fn missing_path_is_rejected() {
        assert!(Options::try_parse_from(["filemap"]).is_err());
    }
}
