use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilemapError>;

/// Errors produced by the scanner. Every variant names the path that was
/// being processed; there is no recovery from any of them — the run aborts.
#[derive(Error, Debug)]
pub enum FilemapError {
    #[error("while scanning '{path}': {op}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("while scanning '{path}': truncated extents returned; file being written to?")]
    TruncatedExtents { path: String },

    #[error("while scanning '{path}': cannot handle files with shared extents \
             (physical offset {offset} already claimed by another inode)")]
    SharedExtent { path: String, offset: u64 },

    #[error("while scanning '{path}': not a file or directory")]
    NotFileOrDirectory { path: String },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl FilemapError {
    pub(crate) fn io(op: &'static str, path: &str, source: std::io::Error) -> Self {
        FilemapError::Io {
            op,
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn errno(op: &'static str, path: &str, errno: nix::errno::Errno) -> Self {
        Self::io(op, path, std::io::Error::from_raw_os_error(errno as i32))
    }
}
