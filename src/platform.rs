//! Identity of the platform a binary was built for
//!
//! A [`Platform`] is extracted from a binary by the format readers and
//! drives two decisions: which container format to expect when reading,
//! and which search rules apply when resolving library names.

use serde::Serialize;

/// Operating system a binary targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatingSystem {
    Linux,
    Windows,
}

impl OperatingSystem {
    /// OS this program is running on.
    pub fn native() -> Self {
        if cfg!(windows) {
            OperatingSystem::Windows
        } else {
            OperatingSystem::Linux
        }
    }

    /// Whether library file names compare case-insensitively on this OS.
    pub fn ignores_file_name_case(self) -> bool {
        matches!(self, OperatingSystem::Windows)
    }
}

/// Executable container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutableFileFormat {
    Elf,
    Pe,
}

impl ExecutableFileFormat {
    pub fn native() -> Self {
        if cfg!(windows) {
            ExecutableFileFormat::Pe
        } else {
            ExecutableFileFormat::Elf
        }
    }
}

/// Processor instruction set a binary was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessorIsa {
    X86_32,
    X86_64,
    Arm64,
    Unknown,
}

impl ProcessorIsa {
    pub fn pointer_width_bits(self) -> u8 {
        match self {
            ProcessorIsa::X86_32 => 32,
            ProcessorIsa::X86_64 | ProcessorIsa::Arm64 => 64,
            ProcessorIsa::Unknown => 0,
        }
    }
}

/// Compiler family that likely produced a binary.
///
/// Only a hint: it refines where compiler-provided runtime libraries are
/// searched, and never participates in platform equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compiler {
    Gcc,
    Clang,
    Msvc,
    Unknown,
}

/// Immutable description of the platform a binary targets.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Platform {
    operating_system: OperatingSystem,
    executable_file_format: ExecutableFileFormat,
    processor_isa: ProcessorIsa,
    compiler: Compiler,
}

impl Platform {
    pub fn new(
        operating_system: OperatingSystem,
        executable_file_format: ExecutableFileFormat,
        compiler: Compiler,
        processor_isa: ProcessorIsa,
    ) -> Self {
        Self {
            operating_system,
            executable_file_format,
            processor_isa,
            compiler,
        }
    }

    pub fn operating_system(&self) -> OperatingSystem {
        self.operating_system
    }

    pub fn executable_file_format(&self) -> ExecutableFileFormat {
        self.executable_file_format
    }

    pub fn processor_isa(&self) -> ProcessorIsa {
        self.processor_isa
    }

    pub fn compiler(&self) -> Compiler {
        self.compiler
    }
}

/// Equality ignores the compiler hint: two binaries built by different
/// compilers for the same OS/format/ISA are the same platform.
impl PartialEq for Platform {
    fn eq(&self, other: &Self) -> bool {
        self.operating_system == other.operating_system
            && self.executable_file_format == other.executable_file_format
            && self.processor_isa == other.processor_isa
    }
}

impl Eq for Platform {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_compiler() {
        let gcc = Platform::new(
            OperatingSystem::Linux,
            ExecutableFileFormat::Elf,
            Compiler::Gcc,
            ProcessorIsa::X86_64,
        );
        let clang = Platform::new(
            OperatingSystem::Linux,
            ExecutableFileFormat::Elf,
            Compiler::Clang,
            ProcessorIsa::X86_64,
        );
        assert_eq!(gcc, clang);
    }

    #[test]
    fn equality_observes_isa() {
        let p64 = Platform::new(
            OperatingSystem::Linux,
            ExecutableFileFormat::Elf,
            Compiler::Gcc,
            ProcessorIsa::X86_64,
        );
        let p32 = Platform::new(
            OperatingSystem::Linux,
            ExecutableFileFormat::Elf,
            Compiler::Gcc,
            ProcessorIsa::X86_32,
        );
        assert_ne!(p64, p32);
    }

    #[test]
    fn windows_folds_file_name_case() {
        assert!(OperatingSystem::Windows.ignores_file_name_case());
        assert!(!OperatingSystem::Linux.ignores_file_name_case());
    }
}
