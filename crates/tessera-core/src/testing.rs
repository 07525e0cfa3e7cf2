//! In-memory capabilities for tests. Enabled with the `testing` feature.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::capability::{
    Analyzer, CommitFiles, ContextManager, ModifiedFile, Project, Repository, WeightedSeeds,
};
use crate::code_unit::{CodeUnit, CodeUnitKind};
use crate::error::{Cancelled, FragmentError, RepoError};
use crate::file::ProjectFile;
use crate::ids::IdGenerator;

/// Class unit named by a dotted fq name, e.g. `com.x.A`.
pub fn class_unit(file: &ProjectFile, fq_name: &str) -> Result<CodeUnit, FragmentError> {
    let (package, short) = fq_name.rsplit_once('.').unwrap_or(("", fq_name));
    CodeUnit::new(file.clone(), CodeUnitKind::Class, package, short)
}

#[derive(Default)]
pub struct StubAnalyzer {
    declarations: Vec<CodeUnit>,
    imports: BTreeMap<ProjectFile, BTreeSet<ProjectFile>>,
    skeletons: BTreeMap<String, String>,
    usages: BTreeMap<String, String>,
    ranking: Vec<CodeUnit>,
    last_seeds: Mutex<Option<WeightedSeeds>>,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_declaration(mut self, cu: CodeUnit) -> Self {
        self.declarations.push(cu);
        self
    }

    pub fn with_import(mut self, from: &ProjectFile, to: &ProjectFile) -> Self {
        self.imports
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        self
    }

    pub fn with_skeleton(mut self, fq_name: &str, text: &str) -> Self {
        self.skeletons.insert(fq_name.to_string(), text.to_string());
        self
    }

    pub fn with_usages(mut self, fq_name: &str, text: &str) -> Self {
        self.usages.insert(fq_name.to_string(), text.to_string());
        self
    }

    /// Fixed result returned by `rank`, regardless of seeds.
    pub fn with_ranking(mut self, ranking: Vec<CodeUnit>) -> Self {
        self.ranking = ranking;
        self
    }

    /// Seeds passed to the most recent `rank` call.
    pub fn last_seeds(&self) -> Option<WeightedSeeds> {
        self.last_seeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Analyzer for StubAnalyzer {
    fn all_declarations(&self) -> Vec<CodeUnit> {
        self.declarations.clone()
    }

    fn skeleton(&self, fq_name: &str) -> Option<String> {
        self.skeletons.get(fq_name).cloned()
    }

    fn rank(
        &self,
        seeds: &WeightedSeeds,
        cancel: &CancellationToken,
    ) -> Result<Vec<CodeUnit>, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        *self.last_seeds.lock().unwrap_or_else(PoisonError::into_inner) = Some(seeds.clone());
        Ok(self.ranking.clone())
    }

    fn imported_files(&self, file: &ProjectFile) -> BTreeSet<ProjectFile> {
        self.imports.get(file).cloned().unwrap_or_default()
    }

    fn usages(&self, fq_name: &str) -> Option<String> {
        self.usages.get(fq_name).cloned()
    }
}

/// Repository with canned answers that counts every call it receives.
#[derive(Default)]
pub struct StubRepository {
    tracked: Mutex<BTreeSet<ProjectFile>>,
    modified: BTreeSet<ModifiedFile>,
    commits: Vec<CommitFiles>,
    fail_tracked: bool,
    fail_history: bool,
    calls: AtomicUsize,
}

impl StubRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracked<'a>(self, files: impl IntoIterator<Item = &'a ProjectFile>) -> Self {
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(files.into_iter().cloned());
        self
    }

    pub fn with_modified(mut self, file: ModifiedFile) -> Self {
        self.modified.insert(file);
        self
    }

    /// Append a commit; commits are reported in insertion order.
    pub fn with_commit(mut self, id: &str, files: &[&ProjectFile]) -> Self {
        self.commits.push(CommitFiles {
            id: id.to_string(),
            files: files.iter().map(|f| (*f).clone()).collect(),
        });
        self
    }

    pub fn failing_tracked_files(mut self) -> Self {
        self.fail_tracked = true;
        self
    }

    pub fn failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Repository for StubRepository {
    fn tracked_files(&self) -> Result<BTreeSet<ProjectFile>, RepoError> {
        self.touch();
        if self.fail_tracked {
            return Err(RepoError::Unavailable("stub configured to fail".into()));
        }
        Ok(self
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn modified_files(&self) -> Result<BTreeSet<ModifiedFile>, RepoError> {
        self.touch();
        Ok(self.modified.clone())
    }

    fn co_commit_history(&self, limit: Option<usize>) -> Result<Vec<CommitFiles>, RepoError> {
        self.touch();
        if self.fail_history {
            return Err(RepoError::Operation("stub configured to fail".into()));
        }
        let n = limit.unwrap_or(self.commits.len());
        Ok(self.commits.iter().take(n).cloned().collect())
    }

    fn add(&self, files: &[ProjectFile]) -> Result<(), RepoError> {
        self.touch();
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(files.iter().cloned());
        Ok(())
    }

    fn remove(&self, file: &ProjectFile) -> Result<(), RepoError> {
        self.touch();
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(file);
        Ok(())
    }
}

pub struct StubManager {
    project: Project,
    ids: IdGenerator,
    analyzer: Arc<dyn Analyzer>,
    repo: Option<Arc<dyn Repository>>,
}

impl StubManager {
    pub fn new(
        root: impl Into<PathBuf>,
        analyzer: Arc<dyn Analyzer>,
        repo: Option<Arc<dyn Repository>>,
    ) -> Self {
        Self {
            project: Project::new(root),
            ids: IdGenerator::new(),
            analyzer,
            repo,
        }
    }
}

impl ContextManager for StubManager {
    fn analyzer(&self) -> Arc<dyn Analyzer> {
        Arc::clone(&self.analyzer)
    }

    fn project(&self) -> &Project {
        &self.project
    }

    fn repo(&self) -> Option<Arc<dyn Repository>> {
        self.repo.clone()
    }

    fn ids(&self) -> &IdGenerator {
        &self.ids
    }
}
