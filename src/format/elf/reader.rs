//! Staged extraction of dependency metadata from an ELF image
//!
//! The read proceeds in stages, each mapping only the bytes it needs:
//! 16 identification bytes, then the file header, then the span covering
//! the section header table, and finally the smallest span that covers
//! the `.dynamic` section, its string table and the section name table.

use super::{
    parse_file_header, parse_ident, parse_section_header, read_i64, read_string_table_entry,
    read_u32, read_u64, ElfClass, FileHeader, SectionHeader, DT_NEEDED, DT_NULL, DT_RPATH,
    DT_RUNPATH, DT_SONAME, SHT_DYNAMIC, SHT_STRTAB,
};
use crate::common::{Error, Result};
use crate::mapper::FileMapper;
use tracing::debug;

/// File header plus the parsed section header table.
pub(crate) struct ElfStructure {
    pub header: FileHeader,
    pub sections: Vec<SectionHeader>,
}

/// Everything the dependency engine wants to know about an ELF file.
pub(crate) struct ElfSummary {
    pub header: FileHeader,
    pub needed_libraries: Vec<String>,
    pub soname: Option<String>,
    pub runpath_string: Option<String>,
    pub runpath_slot: Option<RunPathSlot>,
    pub has_debug_sections: bool,
}

/// Location of the live RUNPATH/RPATH string inside the file, for the
/// in-place writer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunPathSlot {
    /// Absolute file offset of the first byte of the string.
    pub file_offset: u64,
    /// Bytes reserved for the string in the string table, excluding the
    /// terminating NUL.
    pub reserved_len: usize,
}

/// Parse identification, file header and section header table.
///
/// Returns `Ok(None)` when the file is not ELF at all; once the
/// identification matched, every structural problem is a hard error.
pub(crate) fn parse_structure(mapper: &mut FileMapper) -> Result<Option<ElfStructure>> {
    if mapper.file_len() < 16 {
        return Ok(None);
    }
    let ident = match parse_ident(mapper.view(0, 16)?) {
        Some(ident) => ident,
        None => return Ok(None),
    };

    let header_bytes = mapper.view(0, ident.class.file_header_len())?;
    let header = parse_file_header(header_bytes, ident)?;

    let mut sections = Vec::new();
    if header.e_shnum > 0 && header.e_shoff > 0 {
        let table_len = u64::from(header.e_shnum) * u64::from(header.e_shentsize);
        let end = header.e_shoff.checked_add(table_len).ok_or_else(|| {
            Error::FormatRead("section header table offset overflows".to_owned())
        })?;
        let data = mapper.view(0, end)?;
        sections.reserve(header.e_shnum as usize);
        for i in 0..header.e_shnum as usize {
            let offset = header.e_shoff as usize + i * header.e_shentsize as usize;
            sections.push(parse_section_header(data, offset, ident)?);
        }
    }

    Ok(Some(ElfStructure { header, sections }))
}

/// Read the dependency summary of an ELF file.
///
/// `Ok(None)` means "not an ELF file" so the caller can probe the other
/// format.
pub(crate) fn read_summary(mapper: &mut FileMapper) -> Result<Option<ElfSummary>> {
    let structure = match parse_structure(mapper)? {
        Some(structure) => structure,
        None => return Ok(None),
    };
    let header = structure.header;

    let dynamic = structure
        .sections
        .iter()
        .find(|s| s.sh_type == SHT_DYNAMIC)
        .copied();

    let name_table = section_name_table(&structure)?;

    // Smallest span covering everything left to parse.
    let mut span_end = 0u64;
    let mut dynstr: Option<SectionHeader> = None;
    if let Some(dynamic) = &dynamic {
        let strtab = *structure
            .sections
            .get(dynamic.sh_link as usize)
            .ok_or_else(|| {
                Error::FormatRead(format!(
                    "dynamic section links to nonexistent string table {}",
                    dynamic.sh_link
                ))
            })?;
        if strtab.sh_type != SHT_STRTAB {
            return Err(Error::FormatRead(format!(
                "section {} linked as dynamic string table is not a string table",
                dynamic.sh_link
            )));
        }
        span_end = span_end.max(dynamic.end_offset()?).max(strtab.end_offset()?);
        dynstr = Some(strtab);
    }
    if let Some(names) = &name_table {
        span_end = span_end.max(names.end_offset()?);
    }

    let data = mapper.view(0, span_end)?;

    let has_debug_sections = match &name_table {
        Some(names) => {
            let table = section_bytes(data, names)?;
            structure.sections.iter().any(|s| {
                read_string_table_entry(table, s.sh_name as usize)
                    .map(|name| name.starts_with(".debug"))
                    .unwrap_or(false)
            })
        }
        None => false,
    };

    let mut summary = ElfSummary {
        header,
        needed_libraries: Vec::new(),
        soname: None,
        runpath_string: None,
        runpath_slot: None,
        has_debug_sections,
    };

    if let (Some(dynamic), Some(dynstr)) = (dynamic, dynstr) {
        parse_dynamic(data, &dynamic, &dynstr, &mut summary)?;
    }

    debug!(
        path = %mapper.path().display(),
        needed = summary.needed_libraries.len(),
        has_runpath = summary.runpath_string.is_some(),
        "read ELF dependency summary"
    );

    Ok(Some(summary))
}

fn section_name_table(structure: &ElfStructure) -> Result<Option<SectionHeader>> {
    let index = structure.header.e_shstrndx as usize;
    if index == 0 || structure.sections.is_empty() {
        return Ok(None);
    }
    let names = structure.sections.get(index).copied().ok_or_else(|| {
        Error::FormatRead(format!("section name table index {index} is out of range"))
    })?;
    Ok(Some(names))
}

fn section_bytes<'a>(data: &'a [u8], section: &SectionHeader) -> Result<&'a [u8]> {
    let start = section.sh_offset as usize;
    let end = section.end_offset()? as usize;
    data.get(start..end).ok_or_else(|| {
        Error::FormatRead(format!(
            "section contents 0x{:x}..0x{end:x} are beyond the mapped image",
            section.sh_offset
        ))
    })
}

fn parse_dynamic(
    data: &[u8],
    dynamic: &SectionHeader,
    dynstr: &SectionHeader,
    summary: &mut ElfSummary,
) -> Result<()> {
    let entries = section_bytes(data, dynamic)?;
    let strings = section_bytes(data, dynstr)?;
    let class = summary.header.ident.class;
    let endian = summary.header.ident.endian;
    let entry_len = class.dynamic_entry_len();

    // The last DT_RPATH/DT_RUNPATH wins should one be repeated;
    // DT_RUNPATH takes precedence over DT_RPATH when both are present.
    let mut rpath_val: Option<u64> = None;
    let mut runpath_val: Option<u64> = None;

    let mut offset = 0;
    while offset + entry_len <= entries.len() {
        let (d_tag, d_val) = match class {
            ElfClass::Elf32 => (
                read_u32(entries, offset, endian)? as i64,
                read_u32(entries, offset + 4, endian)? as u64,
            ),
            ElfClass::Elf64 => (
                read_i64(entries, offset, endian)?,
                read_u64(entries, offset + 8, endian)?,
            ),
        };
        if d_tag == DT_NULL {
            break;
        }
        match d_tag {
            DT_NEEDED => {
                summary
                    .needed_libraries
                    .push(read_string_table_entry(strings, d_val as usize)?);
            }
            DT_SONAME => {
                summary.soname = Some(read_string_table_entry(strings, d_val as usize)?);
            }
            DT_RPATH => rpath_val = Some(d_val),
            DT_RUNPATH => runpath_val = Some(d_val),
            _ => {}
        }
        offset += entry_len;
    }

    if let Some(string_offset) = runpath_val.or(rpath_val) {
        let string = read_string_table_entry(strings, string_offset as usize)?;
        summary.runpath_slot = Some(RunPathSlot {
            file_offset: dynstr.sh_offset + string_offset,
            reserved_len: string.len(),
        });
        summary.runpath_string = Some(string);
    }

    Ok(())
}
