//! Input record for a resolution session

use crate::common::{Error, Result};
use std::path::{Path, PathBuf};

/// Everything the engine needs to resolve one or more targets.
#[derive(Debug, Clone, Default)]
pub struct ResolveQuery {
    /// Absolute paths of the root binaries to solve.
    pub targets: Vec<PathBuf>,
    /// Directories searched before the platform's system directories,
    /// in order. Each is also consulted with the platform's
    /// conventional library subdirectories appended.
    pub search_prefixes: Vec<PathBuf>,
    /// Mount point of the Windows tree to use for system DLL lookup
    /// when the targets are PE binaries. Defaults to `/`.
    pub windows_root: Option<PathBuf>,
    /// Compiler installation directory (or compiler executable path)
    /// used to locate compiler-provided redistributable runtimes.
    pub compiler_location: Option<PathBuf>,
    /// Use the built-in per-OS exclusion list.
    pub default_exclusions: bool,
    /// Library names to exclude in addition to the defaults.
    pub excluded_names: Vec<String>,
    /// Glob patterns for library names to exclude.
    pub excluded_patterns: Vec<String>,
}

impl ResolveQuery {
    /// Query for a single target, with sensible defaults.
    pub fn for_target(target: impl AsRef<Path>) -> Result<Self> {
        let mut query = Self {
            default_exclusions: true,
            ..Self::default()
        };
        query.add_target(target)?;
        Ok(query)
    }

    /// Add a target; the path is canonicalized so it is absolute.
    pub fn add_target(&mut self, target: impl AsRef<Path>) -> Result<()> {
        let path = fs_err::canonicalize(target.as_ref())
            .map_err(|source| Error::FileOpen { source })?;
        self.targets.push(path);
        Ok(())
    }

    pub fn add_search_prefix(&mut self, prefix: impl Into<PathBuf>) {
        self.search_prefixes.push(prefix.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::elf::{write_temp_file, ElfImageBuilder};

    #[test]
    fn target_paths_are_made_absolute() {
        let file = write_temp_file(&ElfImageBuilder::new().build());
        let query = ResolveQuery::for_target(file.path()).unwrap();
        assert_eq!(query.targets.len(), 1);
        assert!(query.targets[0].is_absolute());
        assert!(query.default_exclusions);
    }

    #[test]
    fn missing_target_fails_at_query_construction() {
        assert!(matches!(
            ResolveQuery::for_target("/no/such/binary"),
            Err(Error::FileOpen { .. })
        ));
    }
}
