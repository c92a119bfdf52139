//! Per-platform shared-library search strategy
//!
//! Turns a bare library name into an absolute path, honoring the search
//! order of the target platform's loader:
//!
//! - Linux/ELF: the run-path of the *directly requesting* file (never an
//!   ancestor's), then the configured search prefixes, then the
//!   well-known system directories for the processor ISA.
//! - Windows/PE: compiler-provided redistributable directories, then the
//!   configured search prefixes, then the well-known system directories
//!   under the windows root. PE has no run-path step.
//!
//! A directory only wins if the file it holds re-opens as an executable
//! or shared library of the expected ISA; mismatches are skipped.

use crate::common::{Error, Result};
use crate::format::probe_binary_file;
use crate::platform::{OperatingSystem, Platform, ProcessorIsa};
use crate::rpath::RPath;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Locates compiler-provided redistributable runtime libraries.
///
/// The main use case is MSVC, whose runtime DLLs live in versioned
/// redist directories next to the toolchain rather than on any search
/// path. This is an explicit, separate search source; it is never folded
/// into the generic prefix list.
#[derive(Debug, Clone)]
pub struct CompilerRuntimeLocator {
    install_dir: PathBuf,
}

impl CompilerRuntimeLocator {
    /// Use an explicit compiler installation root (the `VC` directory
    /// of an MSVC installation).
    pub fn from_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// Deduce the installation root from a compiler executable path like
    /// `.../VC/Tools/MSVC/14.12.25827/bin/Hostx64/x64/cl.exe`.
    pub fn from_compiler_executable(compiler_path: &Path) -> Option<Self> {
        let mut dir = compiler_path.parent()?;
        for _ in 0..6 {
            dir = dir.parent()?;
        }
        Some(Self::from_install_dir(dir))
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Redistributable directories for an ISA, release and debug.
    pub fn redist_directories(&self, processor_isa: ProcessorIsa) -> Vec<PathBuf> {
        let arch = match processor_isa {
            ProcessorIsa::X86_32 => "x86",
            ProcessorIsa::X86_64 => "x64",
            ProcessorIsa::Arm64 => "arm64",
            ProcessorIsa::Unknown => return Vec::new(),
        };

        let mut directories = Vec::new();
        for subtree in [
            format!("Redist/MSVC/*/{arch}/*.CRT"),
            format!("Redist/MSVC/*/debug_nonredist/{arch}/*.DebugCRT"),
        ] {
            let pattern = self.install_dir.join(subtree);
            let Some(pattern) = pattern.to_str() else {
                continue;
            };
            if let Ok(paths) = glob::glob(pattern) {
                directories.extend(paths.flatten().filter(|p| p.is_dir()));
            }
        }
        directories
    }
}

/// Search strategy for one target platform.
pub struct LibrarySearch {
    platform: Platform,
    prefix_directories: Vec<PathBuf>,
    compiler_redist_directories: Vec<PathBuf>,
    system_directories: Vec<PathBuf>,
}

impl LibrarySearch {
    /// Build the strategy for `platform`.
    ///
    /// `search_prefixes` are consulted in order, each expanded with the
    /// platform's conventional library subdirectories. `windows_root` is
    /// the mount point of the inspected Windows tree (`/` when absent)
    /// and is ignored on Linux.
    pub fn new(
        platform: Platform,
        search_prefixes: &[PathBuf],
        windows_root: Option<&Path>,
        compiler_locator: Option<&CompilerRuntimeLocator>,
    ) -> Result<Self> {
        if platform.processor_isa() == ProcessorIsa::Unknown {
            return Err(Error::UnsupportedPlatform(
                "binaries with an unknown processor ISA".to_owned(),
            ));
        }

        let operating_system = platform.operating_system();
        let suffixes: &[&str] = match operating_system {
            OperatingSystem::Linux => &["lib", "qt5/lib"],
            OperatingSystem::Windows => &["bin", "qt5/bin"],
        };

        let mut prefix_directories = Vec::new();
        for prefix in search_prefixes {
            prefix_directories.push(prefix.clone());
            for suffix in suffixes {
                prefix_directories.push(prefix.join(suffix));
            }
        }

        let compiler_redist_directories = match (operating_system, compiler_locator) {
            (OperatingSystem::Windows, Some(locator)) => {
                locator.redist_directories(platform.processor_isa())
            }
            _ => Vec::new(),
        };

        let system_directories = match operating_system {
            OperatingSystem::Linux => system_directories_linux(platform.processor_isa()),
            OperatingSystem::Windows => {
                system_directories_windows(windows_root.unwrap_or(Path::new("/")))
            }
        };

        Ok(Self {
            platform,
            prefix_directories,
            compiler_redist_directories,
            system_directories,
        })
    }

    /// Resolve `library_name` for a file whose run-path is
    /// `dependent_rpath` and whose directory is `dependent_directory`.
    ///
    /// Per ELF semantics only the run-path of the directly requesting
    /// object applies, so callers must pass the immediate parent's
    /// rpath, never an inherited one.
    pub fn resolve(
        &self,
        library_name: &str,
        dependent_rpath: &RPath,
        dependent_directory: &Path,
    ) -> Option<PathBuf> {
        if self.platform.operating_system() == OperatingSystem::Linux {
            for entry in dependent_rpath {
                let directory = if entry.is_relative() {
                    dependent_directory.join(entry.path())
                } else {
                    PathBuf::from(entry.path())
                };
                if let Some(found) = self.try_directory(&directory, library_name) {
                    return Some(found);
                }
            }
        }

        for directory in self
            .compiler_redist_directories
            .iter()
            .chain(&self.prefix_directories)
            .chain(&self.system_directories)
        {
            if let Some(found) = self.try_directory(directory, library_name) {
                return Some(found);
            }
        }

        debug!(library = library_name, "library not found in any search location");
        None
    }

    fn try_directory(&self, directory: &Path, library_name: &str) -> Option<PathBuf> {
        let candidate = if self.platform.operating_system().ignores_file_name_case() {
            find_file_case_insensitive(directory, library_name)?
        } else {
            let candidate = directory.join(library_name);
            if !candidate.is_file() {
                return None;
            }
            candidate
        };

        match probe_binary_file(&candidate) {
            Ok(probe)
                if probe.format == self.platform.executable_file_format()
                    && probe.processor_isa == self.platform.processor_isa()
                    && probe.is_executable_or_library =>
            {
                Some(candidate)
            }
            Ok(probe) => {
                trace!(
                    candidate = %candidate.display(),
                    isa = ?probe.processor_isa,
                    "skipping candidate with mismatched format or ISA"
                );
                None
            }
            Err(_) => {
                trace!(
                    candidate = %candidate.display(),
                    "skipping unreadable candidate"
                );
                None
            }
        }
    }
}

/// Case-insensitive lookup of `file_name` in `directory`, as the
/// Windows loader would see it. Exactly one match is required.
fn find_file_case_insensitive(directory: &Path, file_name: &str) -> Option<PathBuf> {
    let folded = file_name.to_lowercase();
    let mut matches = std::fs::read_dir(directory)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.to_lowercase() == folded)
                .unwrap_or(false)
        });
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.path())
}

fn system_directories_linux(processor_isa: ProcessorIsa) -> Vec<PathBuf> {
    let directories: &[&str] = match processor_isa {
        ProcessorIsa::X86_64 => &[
            "/usr/lib/x86_64-linux-gnu",
            "/usr/lib",
            "/lib/x86_64-linux-gnu",
            "/lib",
            "/lib64",
        ],
        ProcessorIsa::X86_32 => &[
            "/usr/lib/i386-linux-gnu",
            "/usr/lib32",
            "/usr/lib",
            "/lib32",
            "/lib",
        ],
        ProcessorIsa::Arm64 => &[
            "/usr/lib/aarch64-linux-gnu",
            "/usr/lib",
            "/lib/aarch64-linux-gnu",
            "/lib",
        ],
        ProcessorIsa::Unknown => &[],
    };
    directories.iter().map(PathBuf::from).collect()
}

fn system_directories_windows(windows_root: &Path) -> Vec<PathBuf> {
    ["windows/system32", "windows/syswow64", "windows/system"]
        .iter()
        .map(|sub| windows_root.join(sub))
        .collect()
}
