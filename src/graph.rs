//! Incremental dependency graph
//!
//! Vertices are files keyed by bare file name, held in an arena and
//! addressed by index; edges are "depends on". The graph is built by
//! fixpoint passes: candidates are collected up front, each candidate is
//! resolved and read, and the dependencies discovered during the sweep
//! are applied to the graph only after it — the graph is never mutated
//! mid-pass. Because every vertex moves monotonically to a terminal
//! state and is read at most once, the build terminates on cyclic
//! dependency sets, and shared dependencies of multiple targets are
//! read a single time.

use crate::common::{file_name_string, parent_directory, path_to_string, Error, Result};
use crate::exclusion::ExclusionPolicy;
use crate::format::{read_binary_file, BinaryFileInfo};
use crate::platform::Platform;
use crate::rpath::RPath;
use crate::search::LibrarySearch;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a vertex stands in its lifecycle.
///
/// `Unresolved → Resolving → {Resolved, NotFound, Excluded}`; the three
/// terminal states are never left, and `Resolving` is only observable
/// while a pass is processing the vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStatus {
    Unresolved,
    Resolving,
    Resolved,
    NotFound,
    ExcludedFromRedistribution,
}

impl VertexStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VertexStatus::Resolved
                | VertexStatus::NotFound
                | VertexStatus::ExcludedFromRedistribution
        )
    }
}

/// One file in the graph.
///
/// The needed-library list and the rpath are write-once: they are set
/// when the file is read and never touched again, so re-discovering the
/// same name is a no-op.
#[derive(Debug, Clone)]
pub struct GraphFile {
    file_name: String,
    absolute_path: Option<PathBuf>,
    rpath: RPath,
    needed_libraries: Option<Vec<String>>,
    status: VertexStatus,
    /// Vertex whose edge first discovered this file; its rpath and
    /// directory form the search context.
    discovered_from: Option<usize>,
    is_target: bool,
}

impl GraphFile {
    fn from_library_name(name: &str) -> Self {
        Self {
            file_name: name.to_owned(),
            absolute_path: None,
            rpath: RPath::new(),
            needed_libraries: None,
            status: VertexStatus::Unresolved,
            discovered_from: None,
            is_target: false,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn absolute_path(&self) -> Option<&Path> {
        self.absolute_path.as_deref()
    }

    pub fn rpath(&self) -> &RPath {
        &self.rpath
    }

    /// Direct dependency names, once the file has been read.
    pub fn needed_libraries(&self) -> Option<&[String]> {
        self.needed_libraries.as_deref()
    }

    pub fn status(&self) -> VertexStatus {
        self.status
    }

    pub fn is_target(&self) -> bool {
        self.is_target
    }
}

/// Read access to binaries, as the graph engine sees it.
///
/// The engine goes through this seam so tests can count or fake reads;
/// production code uses [`FormatReader`].
pub trait BinaryFileReader {
    fn read_file(&mut self, path: &Path) -> Result<BinaryFileInfo>;
}

/// Reader backed by the real format readers.
#[derive(Debug, Default)]
pub struct FormatReader;

impl BinaryFileReader for FormatReader {
    fn read_file(&mut self, path: &Path) -> Result<BinaryFileInfo> {
        read_binary_file(path)
    }
}

/// Terminal state of one library in a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LibraryStatus {
    Resolved,
    NotFound,
    ExcludedFromRedistribution,
}

/// One entry of a [`DependencyResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLibrary {
    pub name: String,
    pub path: Option<PathBuf>,
    pub status: LibraryStatus,
}

/// The transitive dependencies of one target, excluding the target
/// itself, in breadth-first discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyResult {
    pub target: PathBuf,
    pub libraries: Vec<ResolvedLibrary>,
    pub is_solved: bool,
}

impl DependencyResult {
    /// Names of the dependencies that could not be located.
    pub fn missing_library_names(&self) -> Vec<&str> {
        self.libraries
            .iter()
            .filter(|l| l.status == LibraryStatus::NotFound)
            .map(|l| l.name.as_str())
            .collect()
    }
}

/// The dependency graph of one resolution session.
///
/// One or more targets share the graph so their common dependencies are
/// read exactly once; per-target results are extracted afterwards.
pub struct DependencyGraph {
    platform: Platform,
    vertices: Vec<GraphFile>,
    adjacency: Vec<Vec<usize>>,
    edges: HashSet<(usize, usize)>,
    index_by_name: HashMap<String, usize>,
}

impl DependencyGraph {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            vertices: Vec::new(),
            adjacency: Vec::new(),
            edges: HashSet::new(),
            index_by_name: HashMap::new(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &GraphFile> {
        self.vertices.iter()
    }

    /// Add a resolution root. Targets always come with a known absolute
    /// path.
    pub fn add_target(&mut self, path: &Path) -> Result<()> {
        if !path.is_absolute() {
            return Err(Error::FileOpen {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("target must be an absolute path: {}", path_to_string(path)),
                ),
            });
        }
        let name = file_name_string(path).ok_or_else(|| Error::FileOpen {
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("target has no file name: {}", path_to_string(path)),
            ),
        })?;

        let index = self.intern(&name);
        let vertex = &mut self.vertices[index];
        if vertex.absolute_path.is_none() {
            vertex.absolute_path = Some(path.to_path_buf());
        }
        vertex.is_target = true;
        Ok(())
    }

    /// Create or reuse the vertex for a file name.
    fn intern(&mut self, name: &str) -> usize {
        let key = self.fold_name(name);
        if let Some(&index) = self.index_by_name.get(&key) {
            return index;
        }
        let index = self.vertices.len();
        self.vertices.push(GraphFile::from_library_name(name));
        self.adjacency.push(Vec::new());
        self.index_by_name.insert(key, index);
        index
    }

    fn fold_name(&self, name: &str) -> String {
        if self.platform.operating_system().ignores_file_name_case() {
            name.to_lowercase()
        } else {
            name.to_owned()
        }
    }

    fn find_vertex(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(&self.fold_name(name)).copied()
    }

    /// Run fixpoint passes until no pass changes any vertex state.
    pub fn build(
        &mut self,
        search: &LibrarySearch,
        exclusions: &ExclusionPolicy,
        reader: &mut dyn BinaryFileReader,
    ) -> Result<()> {
        let mut pass = 0usize;
        loop {
            pass += 1;
            let candidates: Vec<usize> = (0..self.vertices.len())
                .filter(|&i| !self.vertices[i].status.is_terminal())
                .collect();
            if candidates.is_empty() {
                break;
            }

            debug!(pass, candidates = candidates.len(), "dependency graph pass");

            // Dependencies discovered in this pass; applied to the graph
            // only after the sweep so the candidate set stays stable.
            // Vertices created here are first visited in the next pass.
            let mut discovered: Vec<(usize, Vec<String>)> = Vec::new();

            for index in candidates {
                self.vertices[index].status = VertexStatus::Resolving;

                let name = self.vertices[index].file_name.clone();

                if !self.vertices[index].is_target && exclusions.is_excluded(&name) {
                    debug!(library = %name, "excluded from redistribution");
                    self.vertices[index].status = VertexStatus::ExcludedFromRedistribution;
                    continue;
                }

                if self.vertices[index].absolute_path.is_none() {
                    match self.resolve_vertex_path(index, &name, search) {
                        Some(path) => {
                            self.vertices[index].absolute_path = Some(path);
                        }
                        None => {
                            debug!(library = %name, "library not found");
                            self.vertices[index].status = VertexStatus::NotFound;
                            continue;
                        }
                    }
                }

                let path = self.vertices[index]
                    .absolute_path
                    .clone()
                    .expect("vertex path was just resolved");
                let info = reader.read_file(&path)?;

                let vertex = &mut self.vertices[index];
                vertex.rpath = info.rpath;
                vertex.needed_libraries = Some(info.needed_libraries.clone());
                vertex.status = VertexStatus::Resolved;
                discovered.push((index, info.needed_libraries));
            }

            for (dependent, names) in discovered {
                for name in names {
                    self.add_dependency(dependent, &name);
                }
            }
        }

        info!(
            files = self.vertices.len(),
            passes = pass,
            "dependency graph complete"
        );

        Ok(())
    }

    /// Search context for a vertex: the rpath and directory of the
    /// dependent file whose edge first discovered it.
    fn resolve_vertex_path(
        &self,
        index: usize,
        name: &str,
        search: &LibrarySearch,
    ) -> Option<PathBuf> {
        let parent = self.vertices[index].discovered_from?;
        let parent_path = self.vertices[parent].absolute_path.as_deref()?;
        let directory = parent_directory(parent_path);
        search.resolve(name, &self.vertices[parent].rpath, &directory)
    }

    /// Create or reuse the dependency's vertex and add one edge.
    /// Duplicate edges between the same ordered pair collapse.
    fn add_dependency(&mut self, dependent: usize, name: &str) {
        let child = self.intern(name);
        if self.edges.insert((dependent, child)) {
            self.adjacency[dependent].push(child);
        }
        if self.vertices[child].discovered_from.is_none() {
            self.vertices[child].discovered_from = Some(dependent);
        }
    }

    /// Extract the result for one target: every vertex reachable from
    /// it (cycle-safe, visited-set based), excluding the target itself.
    pub fn result_for(&self, target: &Path) -> Option<DependencyResult> {
        let name = file_name_string(target)?;
        let start = self.find_vertex(&name)?;
        if !self.vertices[start].is_target {
            return None;
        }

        let mut visited = vec![false; self.vertices.len()];
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut libraries = Vec::new();

        while let Some(index) = queue.pop_front() {
            for &next in &self.adjacency[index] {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                queue.push_back(next);

                let vertex = &self.vertices[next];
                let status = match vertex.status {
                    VertexStatus::Resolved => LibraryStatus::Resolved,
                    VertexStatus::ExcludedFromRedistribution => {
                        LibraryStatus::ExcludedFromRedistribution
                    }
                    _ => LibraryStatus::NotFound,
                };
                libraries.push(ResolvedLibrary {
                    name: vertex.file_name.clone(),
                    path: vertex.absolute_path.clone(),
                    status,
                });
            }
        }

        let is_solved = !libraries
            .iter()
            .any(|l| l.status == LibraryStatus::NotFound);

        Some(DependencyResult {
            target: target.to_path_buf(),
            libraries,
            is_solved,
        })
    }
}
