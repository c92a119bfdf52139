//! In-place RPath replacement
//!
//! The only supported mutation of an ELF file: overwrite the existing
//! RUNPATH/RPATH string inside `.dynstr`. The new value must fit in the
//! space the current string occupies; nothing is ever moved, resized or
//! relinked. When the value does not fit, the operation fails and the
//! file is left untouched.

use super::reader::{read_summary, RunPathSlot};
use crate::common::{Error, Result};
use crate::mapper::FileMapper;
use crate::rpath::{rpath_to_string, RPath};
use memmap2::MmapOptions;
use std::path::Path;
use tracing::debug;

/// Replace the RUNPATH/RPATH of the ELF file at `path` with `rpath`.
pub fn write_rpath(path: &Path, rpath: &RPath) -> Result<()> {
    let encoded = rpath_to_string(rpath);

    // Read-only pass: locate the string we are allowed to overwrite.
    // The mapper is dropped before the file is reopened for writing.
    let slot = locate_slot(path)?;

    if encoded.len() > slot.reserved_len {
        return Err(Error::FormatWrite(format!(
            "new rpath needs {} bytes but only {} are reserved in the file",
            encoded.len(),
            slot.reserved_len
        )));
    }

    let file = fs_err::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| Error::FileOpen { source })?;
    let mut map = unsafe { MmapOptions::new().map_mut(file.file()).map_err(Error::Io)? };

    let start = slot.file_offset as usize;
    let end = start + slot.reserved_len + 1;
    if end > map.len() {
        return Err(Error::FormatRead(format!(
            "rpath string at 0x{start:x} runs beyond the file"
        )));
    }

    map[start..start + encoded.len()].copy_from_slice(encoded.as_bytes());
    // NUL-fill up to and including the old terminator so the shorter
    // string terminates and no stale suffix survives.
    for byte in &mut map[start + encoded.len()..end] {
        *byte = 0;
    }
    map.flush().map_err(Error::Io)?;

    debug!(path = %path.display(), rpath = %encoded, "rewrote rpath in place");

    Ok(())
}

fn locate_slot(path: &Path) -> Result<RunPathSlot> {
    let mut mapper = FileMapper::open(path)?;
    let summary = read_summary(&mut mapper)?
        .ok_or_else(|| Error::FormatRead("not an ELF image".to_owned()))?;
    summary.runpath_slot.ok_or_else(|| {
        Error::FormatWrite(
            "the file has no RUNPATH or RPATH entry whose space could be reused".to_owned(),
        )
    })
}
