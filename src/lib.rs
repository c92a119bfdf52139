//! Transitive shared-library dependency resolution for ELF and PE
//! binaries.
//!
//! Given one or more target binaries, the crate reads their
//! needed-library names, resolves each name to an absolute path the way
//! the target platform's loader would, and repeats transitively —
//! caching every file read in a shared dependency graph — to produce a
//! per-target [`DependencyResult`]. The typical consumer copies the
//! found, non-excluded files next to the application and rewrites its
//! run-path with [`write_rpath`] so the bundle runs standalone.

pub mod common;
pub mod exclusion;
pub mod format;
pub mod graph;
pub mod library_name;
pub mod mapper;
pub mod platform;
pub mod query;
pub mod rpath;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;

pub use common::{Error, Result};
pub use exclusion::ExclusionPolicy;
pub use format::{probe_binary_file, read_binary_file, write_rpath, BinaryFileInfo};
pub use graph::{
    BinaryFileReader, DependencyGraph, DependencyResult, FormatReader, GraphFile,
    LibraryStatus, ResolvedLibrary, VertexStatus,
};
pub use library_name::{is_qt_library, LibraryName};
pub use platform::{Compiler, ExecutableFileFormat, OperatingSystem, Platform, ProcessorIsa};
pub use query::ResolveQuery;
pub use rpath::{rpath_from_string, rpath_to_string, RPath, RPathEntry};
pub use search::{CompilerRuntimeLocator, LibrarySearch};

/// Resolve the full transitive dependency set of every target in the
/// query, in one shared session.
///
/// The target platform is taken from the first target binary; every
/// library is validated against it during search. Results come back in
/// target order.
pub fn resolve_dependencies(query: &ResolveQuery) -> Result<Vec<DependencyResult>> {
    let first_target = query
        .targets
        .first()
        .ok_or_else(|| Error::InvalidQuery("no targets given".to_owned()))?;
    let platform = read_binary_file(first_target)?.platform;

    let compiler_locator = query.compiler_location.as_ref().map(|location| {
        if location.is_file() {
            CompilerRuntimeLocator::from_compiler_executable(location)
                .unwrap_or_else(|| CompilerRuntimeLocator::from_install_dir(location))
        } else {
            CompilerRuntimeLocator::from_install_dir(location)
        }
    });

    let search = LibrarySearch::new(
        platform,
        &query.search_prefixes,
        query.windows_root.as_deref(),
        compiler_locator.as_ref(),
    )?;

    let mut exclusions = if query.default_exclusions {
        ExclusionPolicy::os_defaults(platform.operating_system())
    } else {
        ExclusionPolicy::empty(platform.operating_system())
    };
    for name in &query.excluded_names {
        exclusions.add_name(name);
    }
    for pattern in &query.excluded_patterns {
        exclusions
            .add_pattern(pattern)
            .map_err(|e| Error::InvalidQuery(format!("exclusion pattern '{pattern}': {e}")))?;
    }

    let mut graph = DependencyGraph::new(platform);
    for target in &query.targets {
        graph.add_target(target)?;
    }
    graph.build(&search, &exclusions, &mut FormatReader)?;

    Ok(query
        .targets
        .iter()
        .filter_map(|target| graph.result_for(target))
        .collect())
}
