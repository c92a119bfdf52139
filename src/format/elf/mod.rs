//! Minimal ELF reader and RPath writer
//!
//! Only the structures needed to answer the dependency questions are
//! parsed: identification, file header, section header table, the
//! `.dynamic` section and its string table. Parsing is staged through a
//! [`crate::mapper::FileMapper`] so a query touches only the bytes it
//! needs.

pub mod reader;
pub mod writer;

use crate::common::{Error, Result};
use crate::platform::ProcessorIsa;

pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;

pub const EM_386: u16 = 3;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

pub const SHT_STRTAB: u32 = 3;
pub const SHT_DYNAMIC: u32 = 6;

pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_SONAME: i64 = 14;
pub const DT_RPATH: i64 = 15;
pub const DT_RUNPATH: i64 = 29;

/// 32 or 64 bit image, from `EI_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    pub fn file_header_len(self) -> u64 {
        match self {
            ElfClass::Elf32 => 52,
            ElfClass::Elf64 => 64,
        }
    }

    pub fn section_header_len(self) -> u64 {
        match self {
            ElfClass::Elf32 => 40,
            ElfClass::Elf64 => 64,
        }
    }

    pub fn dynamic_entry_len(self) -> usize {
        match self {
            ElfClass::Elf32 => 8,
            ElfClass::Elf64 => 16,
        }
    }
}

/// Byte order of the image, from `EI_DATA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfEndian {
    Little,
    Big,
}

/// The validated part of `e_ident`.
#[derive(Debug, Clone, Copy)]
pub struct ElfIdent {
    pub class: ElfClass,
    pub endian: ElfEndian,
}

/// Soft classification over the first 16 bytes.
///
/// Returns `None` when the bytes are not a valid ELF identification
/// (wrong magic, unknown class or data encoding), so a caller can go on
/// and probe another format.
pub fn parse_ident(bytes: &[u8]) -> Option<ElfIdent> {
    if bytes.len() < 16 || &bytes[0..4] != ELF_MAGIC {
        return None;
    }
    let class = match bytes[4] {
        1 => ElfClass::Elf32,
        2 => ElfClass::Elf64,
        _ => return None,
    };
    let endian = match bytes[5] {
        1 => ElfEndian::Little,
        2 => ElfEndian::Big,
        _ => return None,
    };
    Some(ElfIdent { class, endian })
}

/// The file header fields consumed by this crate.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub ident: ElfIdent,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_shoff: u64,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl FileHeader {
    pub fn is_executable_or_shared_library(&self) -> bool {
        self.e_type == ET_EXEC || self.e_type == ET_DYN
    }

    pub fn processor_isa(&self) -> ProcessorIsa {
        match self.e_machine {
            EM_386 => ProcessorIsa::X86_32,
            EM_X86_64 => ProcessorIsa::X86_64,
            EM_AARCH64 => ProcessorIsa::Arm64,
            _ => ProcessorIsa::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
}

impl SectionHeader {
    /// Exclusive end offset of the section contents in the file.
    pub fn end_offset(&self) -> Result<u64> {
        self.sh_offset.checked_add(self.sh_size).ok_or_else(|| {
            Error::FormatRead(format!(
                "section at 0x{:x} with size 0x{:x} overflows",
                self.sh_offset, self.sh_size
            ))
        })
    }
}

pub fn read_u16(data: &[u8], offset: usize, endian: ElfEndian) -> Result<u16> {
    let bytes: [u8; 2] = data
        .get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated(offset, 2))?;
    Ok(match endian {
        ElfEndian::Little => u16::from_le_bytes(bytes),
        ElfEndian::Big => u16::from_be_bytes(bytes),
    })
}

pub fn read_u32(data: &[u8], offset: usize, endian: ElfEndian) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated(offset, 4))?;
    Ok(match endian {
        ElfEndian::Little => u32::from_le_bytes(bytes),
        ElfEndian::Big => u32::from_be_bytes(bytes),
    })
}

pub fn read_u64(data: &[u8], offset: usize, endian: ElfEndian) -> Result<u64> {
    let bytes: [u8; 8] = data
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated(offset, 8))?;
    Ok(match endian {
        ElfEndian::Little => u64::from_le_bytes(bytes),
        ElfEndian::Big => u64::from_be_bytes(bytes),
    })
}

pub fn read_i64(data: &[u8], offset: usize, endian: ElfEndian) -> Result<i64> {
    read_u64(data, offset, endian).map(|v| v as i64)
}

fn truncated(offset: usize, needed: usize) -> Error {
    Error::FormatRead(format!(
        "truncated image: need {needed} bytes at offset 0x{offset:x}"
    ))
}

/// Read a NUL-terminated string out of a string table.
pub fn read_string_table_entry(table: &[u8], offset: usize) -> Result<String> {
    let slice = table.get(offset..).ok_or_else(|| {
        Error::FormatRead(format!("string offset 0x{offset:x} is outside the table"))
    })?;
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    std::str::from_utf8(&slice[..end])
        .map(str::to_owned)
        .map_err(|_| Error::FormatRead(format!("string at 0x{offset:x} is not valid UTF-8")))
}

/// Parse the file header. The identification must already have been
/// validated; everything from here on is a hard error.
pub fn parse_file_header(data: &[u8], ident: ElfIdent) -> Result<FileHeader> {
    let endian = ident.endian;
    let e_type = read_u16(data, 16, endian)?;
    let e_machine = read_u16(data, 18, endian)?;

    let (e_shoff, e_shentsize, e_shnum, e_shstrndx) = match ident.class {
        ElfClass::Elf32 => (
            read_u32(data, 32, endian)? as u64,
            read_u16(data, 46, endian)?,
            read_u16(data, 48, endian)?,
            read_u16(data, 50, endian)?,
        ),
        ElfClass::Elf64 => (
            read_u64(data, 40, endian)?,
            read_u16(data, 58, endian)?,
            read_u16(data, 60, endian)?,
            read_u16(data, 62, endian)?,
        ),
    };

    if e_shnum > 0 && u64::from(e_shentsize) != ident.class.section_header_len() {
        return Err(Error::FormatRead(format!(
            "invalid section header entry size {e_shentsize}"
        )));
    }

    Ok(FileHeader {
        ident,
        e_type,
        e_machine,
        e_shoff,
        e_shentsize,
        e_shnum,
        e_shstrndx,
    })
}

/// Parse one section header at `offset` within `data`.
pub fn parse_section_header(data: &[u8], offset: usize, ident: ElfIdent) -> Result<SectionHeader> {
    let endian = ident.endian;
    match ident.class {
        ElfClass::Elf32 => Ok(SectionHeader {
            sh_name: read_u32(data, offset, endian)?,
            sh_type: read_u32(data, offset + 4, endian)?,
            sh_offset: read_u32(data, offset + 16, endian)? as u64,
            sh_size: read_u32(data, offset + 20, endian)? as u64,
            sh_link: read_u32(data, offset + 24, endian)?,
        }),
        ElfClass::Elf64 => Ok(SectionHeader {
            sh_name: read_u32(data, offset, endian)?,
            sh_type: read_u32(data, offset + 4, endian)?,
            sh_offset: read_u64(data, offset + 24, endian)?,
            sh_size: read_u64(data, offset + 32, endian)?,
            sh_link: read_u32(data, offset + 40, endian)?,
        }),
    }
}
