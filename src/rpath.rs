//! Run-path model and its ELF string encoding
//!
//! A [`RPath`] is an ordered list of directories embedded in an ELF file
//! and consulted, in order, when the loader resolves that file's needed
//! libraries. The list itself carries no encoding; converting to and
//! from the colon-joined `DT_RUNPATH`/`DT_RPATH` string (including the
//! `$ORIGIN` token) is done by [`rpath_from_string`] and
//! [`rpath_to_string`].

use crate::common::{Error, Result};
use serde::Serialize;

/// One run-path directory, tagged relative or absolute.
///
/// The stored path is normalized: trailing separators are stripped (but
/// `/` itself survives), so `/opt/lib/` and `/opt/lib` compare equal.
/// A relative entry is resolved against the directory of the file that
/// carries the rpath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RPathEntry {
    path: String,
}

impl RPathEntry {
    pub fn new(path: impl Into<String>) -> Self {
        let mut path: String = path.into();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_relative(&self) -> bool {
        !self.path.starts_with('/')
    }
}

/// Ordered sequence of [`RPathEntry`]; order is search order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RPath {
    entries: Vec<RPathEntry>,
}

impl RPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: RPathEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RPathEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a RPath {
    type Item = &'a RPathEntry;
    type IntoIter = std::slice::Iter<'a, RPathEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<RPathEntry> for RPath {
    fn from_iter<T: IntoIterator<Item = RPathEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Decode a single segment of a RUNPATH/RPATH string.
///
/// A leading `$ORIGIN` or `${ORIGIN}` means "the directory containing
/// this file at load time". The token must be followed by a `/`
/// (consumed; the remainder becomes a relative suffix) or by the end of
/// the segment (the entry is then simply `.`). Anything else is a
/// malformed rpath.
pub fn rpath_entry_from_string(segment: &str) -> Result<RPathEntry> {
    let segment = segment.trim();

    let entry_path = if let Some(rest) = strip_origin_token(segment) {
        if rest.is_empty() {
            ".".to_owned()
        } else if let Some(suffix) = rest.strip_prefix('/') {
            if suffix.is_empty() {
                ".".to_owned()
            } else {
                suffix.to_owned()
            }
        } else {
            return Err(Error::RPathFormat(format!(
                "expected '/' or end of entry after origin token, got '{}'",
                rest.chars().next().unwrap_or_default()
            )));
        }
    } else {
        segment.to_owned()
    };

    if entry_path.is_empty() {
        return Ok(RPathEntry::new("."));
    }

    Ok(RPathEntry::new(entry_path))
}

fn strip_origin_token(segment: &str) -> Option<&str> {
    segment
        .strip_prefix("${ORIGIN}")
        .or_else(|| segment.strip_prefix("$ORIGIN"))
}

/// Decode a full colon-joined RUNPATH/RPATH string. Empty segments are
/// dropped.
pub fn rpath_from_string(rpath_string: &str) -> Result<RPath> {
    rpath_string
        .split(':')
        .filter(|segment| !segment.trim().is_empty())
        .map(rpath_entry_from_string)
        .collect()
}

/// Encode a [`RPath`] to the colon-joined ELF string.
///
/// Entries are emitted verbatim; explicit relative paths are not
/// re-compressed into `$ORIGIN` form.
pub fn rpath_to_string(rpath: &RPath) -> String {
    let paths: Vec<&str> = rpath.iter().map(RPathEntry::path).collect();
    paths.join(":")
}
