//! Scoped read-only views over a file
//!
//! Format readers must not pull a whole image into memory just to look
//! at a header: shared libraries can be hundreds of megabytes. A
//! [`FileMapper`] hands out borrowed byte views of exactly the region a
//! parsing step needs, and only remaps when a step asks for more than
//! what is currently mapped. At most one mapping is held at a time, and
//! it is released with the mapper.

use crate::common::{Error, Result};
use memmap2::{Mmap, MmapOptions};
use std::path::{Path, PathBuf};

pub struct FileMapper {
    file: fs_err::File,
    file_len: u64,
    map: Option<Mmap>,
}

impl FileMapper {
    /// Open a file for staged read-only access. No bytes are mapped yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file =
            fs_err::File::open(path.as_ref()).map_err(|source| Error::FileOpen { source })?;
        let file_len = file
            .metadata()
            .map_err(|source| Error::FileOpen { source })?
            .len();

        Ok(Self {
            file,
            file_len,
            map: None,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Size of the underlying file in bytes.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Borrow the bytes `[offset, offset + len)` of the file.
    ///
    /// Requests beyond the end of the file are a hard format error: the
    /// only way to get here is a header whose offsets or counts point
    /// outside the image.
    pub fn view(&mut self, offset: u64, len: u64) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or_else(|| {
            Error::FormatRead(format!("region 0x{offset:x}+0x{len:x} overflows"))
        })?;
        if end > self.file_len {
            return Err(Error::FormatRead(format!(
                "region 0x{offset:x}+0x{len:x} is beyond the file size of {} bytes",
                self.file_len
            )));
        }

        if len == 0 {
            return Ok(&[]);
        }

        let mapped_len = self.map.as_ref().map(|m| m.len() as u64).unwrap_or(0);
        if end > mapped_len {
            // Grow the mapping; the previous one is unmapped first.
            self.map = None;
            let map = unsafe {
                MmapOptions::new()
                    .len(end as usize)
                    .map(self.file.file())
                    .map_err(Error::Io)?
            };
            self.map = Some(map);
        }

        let map = self.map.as_ref().unwrap();
        Ok(&map[offset as usize..end as usize])
    }
}
