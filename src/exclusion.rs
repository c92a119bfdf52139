//! Redistribution exclusion policy
//!
//! Some libraries belong to the operating system and must never be
//! bundled with an application, no matter where they are found on disk:
//! the loader, libc, the GL stack, the Windows core DLLs. The policy
//! marks such names; the dependency graph records them as
//! `ExcludedFromRedistribution` without reading or copying them.

use crate::library_name::LibraryName;
use crate::platform::OperatingSystem;
use glob::{MatchOptions, Pattern, PatternError};
use std::collections::HashSet;

/// Libraries that the Linux distribution and driver stack own.
const EXCLUDED_LIBRARIES_LINUX: &[&str] = &[
    "ld-linux.so.2",
    "ld-linux-x86-64.so.2",
    "libc.so.6",
    "libm.so.6",
    "libmvec.so.1",
    "libdl.so.2",
    "libpthread.so.0",
    "librt.so.1",
    "libresolv.so.2",
    "libutil.so.1",
    "libgcc_s.so.1",
    "libstdc++.so.6",
    "libGL.so.1",
    "libGLX.so.0",
    "libGLdispatch.so.0",
    "libOpenGL.so.0",
    "libEGL.so.1",
    "libdrm.so.2",
    "libgbm.so.1",
    "libX11.so.6",
    "libxcb.so.1",
    "libz.so.1",
    "libexpat.so.1",
    "libfontconfig.so.1",
    "libfreetype.so.6",
    "libharfbuzz.so.0",
    "libglib-2.0.so.0",
    "libgobject-2.0.so.0",
    "libgio-2.0.so.0",
    "libuuid.so.1",
];

/// Windows core DLLs, always provided by the OS.
const EXCLUDED_LIBRARIES_WINDOWS: &[&str] = &[
    "HAL.DLL",
    "NTDLL.DLL",
    "KERNEL32.DLL",
    "GDI32.DLL",
    "USER32.DLL",
    "COMCTL32.DLL",
    "WS2_32.DLL",
    "ADVAPI32.DLL",
    "NETAPI32.DLL",
    "WINMM.DLL",
    "MSVCRT.DLL",
    "mpr.DLL",
    "ole32.DLL",
    "oleaut32.DLL",
    "shell32.DLL",
    "version.DLL",
    "crypt32.DLL",
    "dnsapi.DLL",
    "iphlpapi.DLL",
    "opengl32.DLL",
    "UxTheme.DLL",
    "dwmapi.DLL",
    "imm32.DLL",
    "Secur32.DLL",
    "odbc32.DLL",
    "wsock32.DLL",
];

/// Name/pattern set deciding which libraries are never redistributed.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    names: HashSet<String>,
    patterns: Vec<Pattern>,
    ignore_case: bool,
}

impl ExclusionPolicy {
    /// A policy that excludes nothing.
    pub fn empty(operating_system: OperatingSystem) -> Self {
        Self {
            names: HashSet::new(),
            patterns: Vec::new(),
            ignore_case: operating_system.ignores_file_name_case(),
        }
    }

    /// The built-in exclude list for an operating system.
    pub fn os_defaults(operating_system: OperatingSystem) -> Self {
        let mut policy = Self::empty(operating_system);
        let names = match operating_system {
            OperatingSystem::Linux => EXCLUDED_LIBRARIES_LINUX,
            OperatingSystem::Windows => EXCLUDED_LIBRARIES_WINDOWS,
        };
        for name in names {
            policy.add_name(name);
        }
        policy
    }

    pub fn add_name(&mut self, name: &str) {
        self.names.insert(self.fold(name));
    }

    /// Add a glob pattern, e.g. `libnss_*.so.2`.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.patterns.push(Pattern::new(pattern)?);
        Ok(())
    }

    /// Whether a library with this name must not be redistributed.
    ///
    /// Both the full name and the version-less name are checked against
    /// the name set, so excluding `libc.so` also catches `libc.so.6`.
    pub fn is_excluded(&self, library_name: &str) -> bool {
        if self.names.contains(&self.fold(library_name)) {
            return true;
        }
        let parsed = LibraryName::parse(library_name);
        if parsed.version_suffix().is_some()
            && self.names.contains(&self.fold(&parsed.name_without_version()))
        {
            return true;
        }

        let options = MatchOptions {
            case_sensitive: !self.ignore_case,
            ..MatchOptions::default()
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(library_name, options))
    }

    fn fold(&self, name: &str) -> String {
        if self.ignore_case {
            name.to_lowercase()
        } else {
            name.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_defaults_exclude_libc() {
        let policy = ExclusionPolicy::os_defaults(OperatingSystem::Linux);
        assert!(policy.is_excluded("libc.so.6"));
        assert!(policy.is_excluded("libstdc++.so.6"));
        assert!(!policy.is_excluded("libQt5Core.so.5"));
    }

    #[test]
    fn windows_defaults_fold_case() {
        let policy = ExclusionPolicy::os_defaults(OperatingSystem::Windows);
        assert!(policy.is_excluded("KERNEL32.dll"));
        assert!(policy.is_excluded("kernel32.DLL"));
        assert!(!policy.is_excluded("Qt5Core.dll"));
    }

    #[test]
    fn linux_names_stay_case_sensitive() {
        let mut policy = ExclusionPolicy::empty(OperatingSystem::Linux);
        policy.add_name("libfoo.so.1");
        assert!(policy.is_excluded("libfoo.so.1"));
        assert!(!policy.is_excluded("LIBFOO.SO.1"));
    }

    #[test]
    fn version_less_name_matches_versioned_dependency() {
        let mut policy = ExclusionPolicy::empty(OperatingSystem::Linux);
        policy.add_name("libc.so");
        assert!(policy.is_excluded("libc.so.6"));
        assert!(policy.is_excluded("libc.so"));
        assert!(!policy.is_excluded("libcrypt.so.1"));
    }

    #[test]
    fn patterns_match_families() {
        let mut policy = ExclusionPolicy::empty(OperatingSystem::Linux);
        policy.add_pattern("libnss_*.so.2").unwrap();
        assert!(policy.is_excluded("libnss_dns.so.2"));
        assert!(policy.is_excluded("libnss_files.so.2"));
        assert!(!policy.is_excluded("libnsl.so.2"));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let mut policy = ExclusionPolicy::empty(OperatingSystem::Linux);
        assert!(policy.add_pattern("lib[").is_err());
    }
}
