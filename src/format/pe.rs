//! Minimal PE reader
//!
//! Parses just enough of a PE image to answer the dependency questions:
//! DOS header, COFF header, Optional header magic (PE32 vs PE32+ decides
//! the field widths for the rest), the data directories, the section
//! table for RVA translation, and the import directory for the needed
//! DLL names. PE has no run-path concept and no write support.

use crate::common::{Error, Result};
use crate::mapper::FileMapper;
use crate::platform::ProcessorIsa;
use tracing::debug;

pub const DOS_MAGIC: &[u8; 2] = b"MZ";
pub const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10b;
pub const PE32PLUS_MAGIC: u16 = 0x20b;

pub const MACHINE_I386: u16 = 0x014c;
pub const MACHINE_AMD64: u16 = 0x8664;
pub const MACHINE_ARM64: u16 = 0xaa64;

pub const FILE_EXECUTABLE_IMAGE: u16 = 0x0002;

const IMPORT_DIRECTORY_INDEX: usize = 1;
const DEBUG_DIRECTORY_INDEX: usize = 6;
const IMPORT_DESCRIPTOR_LEN: usize = 20;

/// What the dependency engine wants to know about a PE file.
pub(crate) struct PeSummary {
    pub machine: u16,
    pub is_executable_or_library: bool,
    pub imported_dlls: Vec<String>,
    pub has_debug_info: bool,
}

pub(crate) fn processor_isa(machine: u16) -> ProcessorIsa {
    match machine {
        MACHINE_I386 => ProcessorIsa::X86_32,
        MACHINE_AMD64 => ProcessorIsa::X86_64,
        MACHINE_ARM64 => ProcessorIsa::Arm64,
        _ => ProcessorIsa::Unknown,
    }
}

/// Cheap platform probe: headers only, no import parsing.
pub(crate) fn probe_header(mapper: &mut FileMapper) -> Result<Option<PeHeaderInfo>> {
    parse_headers(mapper)
}

/// Read the dependency summary of a PE file.
///
/// `Ok(None)` means the file does not start with a DOS header at all, so
/// a caller can probe the other format. Once the DOS magic matched,
/// structural problems are hard errors.
pub(crate) fn read_summary(mapper: &mut FileMapper) -> Result<Option<PeSummary>> {
    let headers = match parse_headers(mapper)? {
        Some(headers) => headers,
        None => return Ok(None),
    };

    // Import parsing chases RVAs across the image; map the whole file
    // for this final stage.
    let data = mapper.view(0, mapper.file_len())?;
    let imported_dlls = read_imported_dlls(data, &headers)?;

    debug!(
        path = %mapper.path().display(),
        imports = imported_dlls.len(),
        "read PE dependency summary"
    );

    Ok(Some(PeSummary {
        machine: headers.machine,
        is_executable_or_library: headers.characteristics & FILE_EXECUTABLE_IMAGE != 0,
        imported_dlls,
        has_debug_info: headers.has_debug_info,
    }))
}

pub(crate) struct PeHeaderInfo {
    pub machine: u16,
    pub characteristics: u16,
    pub has_debug_info: bool,
    section_table_offset: u64,
    number_of_sections: u16,
    import_directory: Option<(u32, u32)>,
}

fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| truncated(offset))
}

fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| truncated(offset))
}

fn truncated(offset: usize) -> Error {
    Error::FormatRead(format!("truncated PE image at offset 0x{offset:x}"))
}

fn parse_headers(mapper: &mut FileMapper) -> Result<Option<PeHeaderInfo>> {
    if mapper.file_len() < 64 {
        return Ok(None);
    }
    let dos = mapper.view(0, 64)?;
    if &dos[0..2] != DOS_MAGIC {
        return Ok(None);
    }
    let e_lfanew = u64::from(read_u32_le(dos, 60)?);

    // Signature + COFF header must lie within the file.
    let coff_offset = e_lfanew + 4;
    let coff_end = coff_offset + 20;
    if coff_end > mapper.file_len() {
        return Err(Error::FormatRead(format!(
            "e_lfanew 0x{e_lfanew:x} points beyond the file"
        )));
    }

    let data = mapper.view(0, coff_end)?;
    if &data[e_lfanew as usize..e_lfanew as usize + 4] != PE_SIGNATURE {
        return Err(Error::FormatRead(
            "DOS header present but PE signature missing".to_owned(),
        ));
    }

    let coff = e_lfanew as usize + 4;
    let machine = read_u16_le(data, coff)?;
    let number_of_sections = read_u16_le(data, coff + 2)?;
    let symbol_table_pointer = read_u32_le(data, coff + 8)?;
    let number_of_symbols = read_u32_le(data, coff + 12)?;
    let size_of_optional_header = read_u16_le(data, coff + 16)?;
    let characteristics = read_u16_le(data, coff + 18)?;

    let optional_offset = coff + 20;
    let section_table_offset = (optional_offset + size_of_optional_header as usize) as u64;

    let mut import_directory = None;
    let mut debug_directory_present = false;

    if size_of_optional_header >= 2 {
        let optional_end = optional_offset as u64 + u64::from(size_of_optional_header);
        let data = mapper.view(0, optional_end)?;
        let magic = read_u16_le(data, optional_offset)?;

        // PE32 and PE32+ place the directory count and table at
        // different offsets; everything before differs only in widths
        // we do not consume.
        let (count_offset, directories_offset) = match magic {
            PE32_MAGIC => (optional_offset + 92, optional_offset + 96),
            PE32PLUS_MAGIC => (optional_offset + 108, optional_offset + 112),
            other => {
                return Err(Error::FormatRead(format!(
                    "unknown optional header magic 0x{other:04x}"
                )))
            }
        };

        if count_offset + 4 <= optional_end as usize {
            let count = read_u32_le(data, count_offset)?.min(16) as usize;
            for index in 0..count {
                let entry = directories_offset + index * 8;
                if entry + 8 > optional_end as usize {
                    break;
                }
                let rva = read_u32_le(data, entry)?;
                let size = read_u32_le(data, entry + 4)?;
                if index == IMPORT_DIRECTORY_INDEX && rva != 0 && size != 0 {
                    import_directory = Some((rva, size));
                }
                if index == DEBUG_DIRECTORY_INDEX && rva != 0 && size != 0 {
                    debug_directory_present = true;
                }
            }
        }
    }

    let has_debug_info =
        debug_directory_present || (symbol_table_pointer != 0 && number_of_symbols > 0);

    Ok(Some(PeHeaderInfo {
        machine,
        characteristics,
        has_debug_info,
        section_table_offset,
        number_of_sections,
        import_directory,
    }))
}

struct PeSection {
    virtual_address: u32,
    virtual_size: u32,
    raw_data_offset: u32,
    raw_data_size: u32,
}

fn parse_sections(data: &[u8], headers: &PeHeaderInfo) -> Result<Vec<PeSection>> {
    let mut sections = Vec::with_capacity(headers.number_of_sections as usize);
    for i in 0..headers.number_of_sections as usize {
        let offset = headers.section_table_offset as usize + i * 40;
        sections.push(PeSection {
            virtual_size: read_u32_le(data, offset + 8)?,
            virtual_address: read_u32_le(data, offset + 12)?,
            raw_data_size: read_u32_le(data, offset + 16)?,
            raw_data_offset: read_u32_le(data, offset + 20)?,
        });
    }
    Ok(sections)
}

fn rva_to_offset(sections: &[PeSection], rva: u32) -> Option<usize> {
    for section in sections {
        let span = section.virtual_size.max(section.raw_data_size);
        if rva >= section.virtual_address && rva < section.virtual_address.saturating_add(span) {
            let delta = rva - section.virtual_address;
            if delta < section.raw_data_size {
                return Some(section.raw_data_offset as usize + delta as usize);
            }
            return None;
        }
    }
    None
}

fn read_cstring(data: &[u8], offset: usize) -> Result<String> {
    let slice = data
        .get(offset..)
        .ok_or_else(|| Error::FormatRead(format!("name offset 0x{offset:x} is beyond the file")))?;
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    std::str::from_utf8(&slice[..end])
        .map(str::to_owned)
        .map_err(|_| Error::FormatRead(format!("name at 0x{offset:x} is not valid UTF-8")))
}

fn read_imported_dlls(data: &[u8], headers: &PeHeaderInfo) -> Result<Vec<String>> {
    let (import_rva, _) = match headers.import_directory {
        Some(directory) => directory,
        None => return Ok(Vec::new()),
    };
    let sections = parse_sections(data, headers)?;
    let mut offset = rva_to_offset(&sections, import_rva)
        .ok_or_else(|| Error::FormatRead(format!("import table RVA 0x{import_rva:x} maps to no section")))?;

    let mut dlls = Vec::new();
    loop {
        if offset + IMPORT_DESCRIPTOR_LEN > data.len() {
            break;
        }
        let descriptor = &data[offset..offset + IMPORT_DESCRIPTOR_LEN];
        if descriptor.iter().all(|&b| b == 0) {
            break;
        }
        let name_rva = read_u32_le(descriptor, 12)?;
        if name_rva != 0 {
            let name_offset = rva_to_offset(&sections, name_rva).ok_or_else(|| {
                Error::FormatRead(format!("import name RVA 0x{name_rva:x} maps to no section"))
            })?;
            dlls.push(read_cstring(data, name_offset)?);
        }
        offset += IMPORT_DESCRIPTOR_LEN;
    }

    Ok(dlls)
}
