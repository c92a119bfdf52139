//! Error taxonomy and small path helpers shared by the whole crate

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures that abort the current operation.
///
/// Recoverable outcomes are deliberately *not* represented here: "this is
/// not an ELF file" during auto-detection, "library not found" and
/// "library excluded from redistribution" are values carried by the
/// result model, so a partially failed resolution stays reportable.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be opened at all (missing, permissions, I/O).
    #[error("could not open file")]
    FileOpen {
        #[source]
        source: std::io::Error,
    },

    /// A file provisionally matched a format but its structure is
    /// invalid (offsets or counts beyond the file size, bad header
    /// fields), or it matched no supported format at all.
    #[error("invalid executable image: {0}")]
    FormatRead(String),

    /// Writing is unsupported for this format, or the new value does
    /// not fit the space reserved in the file.
    #[error("cannot rewrite executable image: {0}")]
    FormatWrite(String),

    /// A `$ORIGIN` token was followed by something other than a path
    /// separator or end of segment.
    #[error("malformed rpath string: {0}")]
    RPathFormat(String),

    /// The target platform has no search strategy.
    #[error("dependency resolution is not supported for {0}")]
    UnsupportedPlatform(String),

    /// The query itself is unusable (no targets, malformed exclusion
    /// pattern).
    #[error("invalid resolve query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Get a lossy printable form of a path, for messages and reports.
pub fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// File name component of a path, as an owned string.
///
/// Returns `None` for paths like `..` that have no file name, or whose
/// name is not valid UTF-8.
pub fn file_name_string(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_owned)
}

/// Parent directory of a path, or the path itself if it has none.
pub fn parent_directory(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}
