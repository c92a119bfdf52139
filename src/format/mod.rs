//! Executable format detection and uniform dependency queries
//!
//! The two container formats are held behind one surface: detect what a
//! file is, read the dependency metadata every caller needs, probe
//! cheaply for search-time validation, and dispatch the single
//! supported write operation. Dispatch is over a plain format tag; each
//! format keeps its parsed state to itself.

pub mod elf;
pub mod pe;

use crate::common::{Error, Result};
use crate::mapper::FileMapper;
use crate::platform::{
    Compiler, ExecutableFileFormat, OperatingSystem, Platform, ProcessorIsa,
};
use crate::rpath::{rpath_from_string, RPath};
use serde::Serialize;
use std::path::Path;

/// Everything the dependency engine needs to know about one binary.
#[derive(Debug, Clone, Serialize)]
pub struct BinaryFileInfo {
    pub platform: Platform,
    /// An executable or shared library, as opposed to a relocatable
    /// object or anything else that merely parses as the format.
    pub is_executable_or_library: bool,
    /// Library names declared at load time (`DT_NEEDED` / import table).
    pub needed_libraries: Vec<String>,
    /// Run-path of the file; always empty for PE.
    pub rpath: RPath,
    /// Canonical shared-object name (`DT_SONAME`); ELF only.
    pub soname: Option<String>,
    pub has_debug_symbols: bool,
}

/// Result of the cheap header-only probe used during library search.
#[derive(Debug, Clone, Copy)]
pub struct BinaryProbe {
    pub format: ExecutableFileFormat,
    pub processor_isa: ProcessorIsa,
    pub is_executable_or_library: bool,
}

/// Read the dependency metadata of the binary at `path`.
///
/// The native platform's format is probed first; if the file is not of
/// that format, the other one is tried. A file matching neither is a
/// hard [`Error::FormatRead`].
pub fn read_binary_file(path: impl AsRef<Path>) -> Result<BinaryFileInfo> {
    let mut mapper = FileMapper::open(path.as_ref())?;

    for format in detection_order() {
        match format {
            ExecutableFileFormat::Elf => {
                if let Some(summary) = elf::reader::read_summary(&mut mapper)? {
                    return elf_info(summary);
                }
            }
            ExecutableFileFormat::Pe => {
                if let Some(summary) = pe::read_summary(&mut mapper)? {
                    return Ok(pe_info(summary));
                }
            }
        }
    }

    Err(Error::FormatRead(format!(
        "{} is neither a valid ELF nor a valid PE image",
        path.as_ref().display()
    )))
}

/// Header-only probe: format, ISA and the executable-or-library flag.
///
/// Used to validate search candidates without paying for a full read.
pub fn probe_binary_file(path: impl AsRef<Path>) -> Result<BinaryProbe> {
    let mut mapper = FileMapper::open(path.as_ref())?;

    for format in detection_order() {
        match format {
            ExecutableFileFormat::Elf => {
                if let Some(structure) = elf::reader::parse_structure(&mut mapper)? {
                    return Ok(BinaryProbe {
                        format: ExecutableFileFormat::Elf,
                        processor_isa: structure.header.processor_isa(),
                        is_executable_or_library: structure
                            .header
                            .is_executable_or_shared_library(),
                    });
                }
            }
            ExecutableFileFormat::Pe => {
                if let Some(headers) = pe::probe_header(&mut mapper)? {
                    return Ok(BinaryProbe {
                        format: ExecutableFileFormat::Pe,
                        processor_isa: pe::processor_isa(headers.machine),
                        is_executable_or_library: headers.characteristics
                            & pe::FILE_EXECUTABLE_IMAGE
                            != 0,
                    });
                }
            }
        }
    }

    Err(Error::FormatRead(format!(
        "{} is neither a valid ELF nor a valid PE image",
        path.as_ref().display()
    )))
}

/// Replace the run-path of the binary at `path`.
///
/// Only implemented for ELF; a PE file is a reported
/// [`Error::FormatWrite`], never silently ignored.
pub fn write_rpath(path: impl AsRef<Path>, rpath: &RPath) -> Result<()> {
    let path = path.as_ref();
    let probe = probe_binary_file(path)?;
    match probe.format {
        ExecutableFileFormat::Elf => elf::writer::write_rpath(path, rpath),
        ExecutableFileFormat::Pe => Err(Error::FormatWrite(
            "PE images have no run path to rewrite".to_owned(),
        )),
    }
}

fn detection_order() -> [ExecutableFileFormat; 2] {
    match ExecutableFileFormat::native() {
        ExecutableFileFormat::Elf => [ExecutableFileFormat::Elf, ExecutableFileFormat::Pe],
        ExecutableFileFormat::Pe => [ExecutableFileFormat::Pe, ExecutableFileFormat::Elf],
    }
}

fn elf_info(summary: elf::reader::ElfSummary) -> Result<BinaryFileInfo> {
    let rpath = match &summary.runpath_string {
        Some(string) => rpath_from_string(string)?,
        None => RPath::new(),
    };
    Ok(BinaryFileInfo {
        platform: Platform::new(
            OperatingSystem::Linux,
            ExecutableFileFormat::Elf,
            Compiler::Gcc,
            summary.header.processor_isa(),
        ),
        is_executable_or_library: summary.header.is_executable_or_shared_library(),
        needed_libraries: summary.needed_libraries,
        rpath,
        soname: summary.soname,
        has_debug_symbols: summary.has_debug_sections,
    })
}

fn pe_info(summary: pe::PeSummary) -> BinaryFileInfo {
    BinaryFileInfo {
        platform: Platform::new(
            OperatingSystem::Windows,
            ExecutableFileFormat::Pe,
            Compiler::Msvc,
            pe::processor_isa(summary.machine),
        ),
        is_executable_or_library: summary.is_executable_or_library,
        needed_libraries: summary.imported_dlls,
        rpath: RPath::new(),
        soname: None,
        has_debug_symbols: summary.has_debug_info,
    }
}
