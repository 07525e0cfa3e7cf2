//! Capabilities a context depends on: code analysis, version control, and
//! the manager that owns both.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::code_unit::CodeUnit;
use crate::error::{Cancelled, FragmentError, RepoError};
use crate::file::ProjectFile;
use crate::ids::IdGenerator;

/// Seed weights keyed by fully-qualified code unit name.
pub type WeightedSeeds = BTreeMap<String, f64>;

/// The project a session works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, rel_path: impl Into<PathBuf>) -> Result<ProjectFile, FragmentError> {
        ProjectFile::new(self.root.clone(), rel_path)
    }
}

/// Code analysis over a project.
pub trait Analyzer: Send + Sync {
    fn all_declarations(&self) -> Vec<CodeUnit>;

    /// Skeleton (signatures without bodies) of a declaration.
    fn skeleton(&self, fq_name: &str) -> Option<String>;

    /// Code units ranked by relevance to `seeds`, best first.
    fn rank(&self, seeds: &WeightedSeeds, cancel: &CancellationToken)
        -> Result<Vec<CodeUnit>, Cancelled>;

    /// Project files directly imported by `file`. External imports are excluded.
    fn imported_files(&self, file: &ProjectFile) -> BTreeSet<ProjectFile>;

    fn definition(&self, fq_name: &str) -> Option<CodeUnit> {
        self.all_declarations()
            .into_iter()
            .find(|cu| cu.fq_name() == fq_name)
    }

    fn declarations_in(&self, file: &ProjectFile) -> Vec<CodeUnit> {
        self.all_declarations()
            .into_iter()
            .filter(|cu| cu.source() == file)
            .collect()
    }

    fn file_for(&self, fq_name: &str) -> Option<ProjectFile> {
        self.definition(fq_name).map(|cu| cu.source().clone())
    }

    /// Members declared directly inside a class.
    fn members_of(&self, class: &CodeUnit) -> Vec<CodeUnit> {
        let prefix = format!("{}.", class.fq_name());
        self.all_declarations()
            .into_iter()
            .filter(|cu| {
                cu.fq_name()
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('.'))
            })
            .collect()
    }

    /// Rendered usages of a symbol, when the analyzer supports it.
    fn usages(&self, _fq_name: &str) -> Option<String> {
        None
    }

    /// Rendered call graph of a method, when the analyzer supports it.
    fn call_graph(&self, _method: &str, _depth: u32, _callees: bool) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModifiedFile {
    pub file: ProjectFile,
    pub status: FileStatus,
}

/// Files changed together by one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFiles {
    pub id: String,
    pub files: Vec<ProjectFile>,
}

/// Version-control access.
pub trait Repository: Send + Sync {
    fn tracked_files(&self) -> Result<BTreeSet<ProjectFile>, RepoError>;

    fn modified_files(&self) -> Result<BTreeSet<ModifiedFile>, RepoError>;

    /// Commit history, newest first, each entry listing the files it changed.
    /// `limit` caps the number of commits walked.
    fn co_commit_history(&self, limit: Option<usize>) -> Result<Vec<CommitFiles>, RepoError>;

    fn add(&self, files: &[ProjectFile]) -> Result<(), RepoError>;

    fn remove(&self, file: &ProjectFile) -> Result<(), RepoError>;
}

/// Owner of the capabilities shared by every snapshot in a session.
pub trait ContextManager: Send + Sync {
    fn analyzer(&self) -> Arc<dyn Analyzer>;

    fn project(&self) -> &Project;

    fn repo(&self) -> Option<Arc<dyn Repository>>;

    fn ids(&self) -> &IdGenerator;
}

// ── Offline capabilities ──

/// Analyzer for a project that has not been (or cannot be) analyzed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnalyzer;

impl Analyzer for NullAnalyzer {
    fn all_declarations(&self) -> Vec<CodeUnit> {
        Vec::new()
    }

    fn skeleton(&self, _fq_name: &str) -> Option<String> {
        None
    }

    fn rank(
        &self,
        _seeds: &WeightedSeeds,
        cancel: &CancellationToken,
    ) -> Result<Vec<CodeUnit>, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        Ok(Vec::new())
    }

    fn imported_files(&self, _file: &ProjectFile) -> BTreeSet<ProjectFile> {
        BTreeSet::new()
    }
}

/// Manager with no analysis and no repository, used by offline tooling that
/// only reads and rewrites persisted sessions.
pub struct OfflineManager {
    project: Project,
    ids: IdGenerator,
    analyzer: Arc<dyn Analyzer>,
}

impl OfflineManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            project: Project::new(root),
            ids: IdGenerator::new(),
            analyzer: Arc::new(NullAnalyzer),
        }
    }
}

impl ContextManager for OfflineManager {
    fn analyzer(&self) -> Arc<dyn Analyzer> {
        Arc::clone(&self.analyzer)
    }

    fn project(&self) -> &Project {
        &self.project
    }

    fn repo(&self) -> Option<Arc<dyn Repository>> {
        None
    }

    fn ids(&self) -> &IdGenerator {
        &self.ids
    }
}
