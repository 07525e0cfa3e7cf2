//! Fragment taxonomy: path-backed fragments and virtual ones.

mod frozen;
mod path;
mod virtual_fragment;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use frozen::{meta_key, FrozenContent, FrozenFragment, FrozenParts};
pub(crate) use frozen::millis_since_epoch;
pub use path::{
    ExternalFileFragment, GitFileFragment, ImageFileFragment, PathFragment, ProjectFileFragment,
};
pub use virtual_fragment::{
    CallGraphFragment, HistoryFragment, PasteImageFragment, PasteTextFragment, SearchFragment,
    SkeletonFragment, StacktraceFragment, StringFragment, SummaryType, TaskFragment,
    UsageFragment, VirtualFragment,
};

use crate::capability::Analyzer;
use crate::code_unit::CodeUnit;
use crate::file::ProjectFile;
use crate::ids::FragmentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentType {
    ProjectFile,
    ExternalFile,
    ImageFile,
    GitFile,
    Task,
    String,
    Search,
    Skeleton,
    Usage,
    PasteText,
    PasteImage,
    Stacktrace,
    CallGraph,
    History,
}

impl FragmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProjectFile => "project_file",
            Self::ExternalFile => "external_file",
            Self::ImageFile => "image_file",
            Self::GitFile => "git_file",
            Self::Task => "task",
            Self::String => "string",
            Self::Search => "search",
            Self::Skeleton => "skeleton",
            Self::Usage => "usage",
            Self::PasteText => "paste_text",
            Self::PasteImage => "paste_image",
            Self::Stacktrace => "stacktrace",
            Self::CallGraph => "call_graph",
            Self::History => "history",
        }
    }

    pub fn is_path(self) -> bool {
        matches!(
            self,
            Self::ProjectFile | Self::ExternalFile | Self::ImageFile | Self::GitFile
        )
    }

    pub fn is_virtual(self) -> bool {
        !self.is_path()
    }
}

impl fmt::Display for FragmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any fragment held by a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Path(PathFragment),
    Virtual(VirtualFragment),
}

impl From<PathFragment> for Fragment {
    fn from(f: PathFragment) -> Self {
        Self::Path(f)
    }
}

impl From<VirtualFragment> for Fragment {
    fn from(f: VirtualFragment) -> Self {
        Self::Virtual(f)
    }
}

impl Fragment {
    pub fn id(&self) -> FragmentId {
        match self {
            Self::Path(p) => p.id(),
            Self::Virtual(v) => v.id(),
        }
    }

    pub fn fragment_type(&self) -> FragmentType {
        match self {
            Self::Path(p) => p.fragment_type(),
            Self::Virtual(v) => v.fragment_type(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Path(p) => p.description(),
            Self::Virtual(v) => v.description(),
        }
    }

    pub fn short_description(&self) -> String {
        match self {
            Self::Path(p) => p.short_description(),
            Self::Virtual(v) => v.short_description(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Path(p) => p.is_dynamic(),
            Self::Virtual(v) => v.is_dynamic(),
        }
    }

    pub fn is_eligible_for_auto_context(&self) -> bool {
        match self {
            Self::Path(_) => true,
            Self::Virtual(v) => v.is_eligible_for_auto_context(),
        }
    }

    /// Code units this fragment refers to, resolved through `analyzer`.
    pub fn sources(&self, analyzer: &dyn Analyzer) -> BTreeSet<CodeUnit> {
        match self {
            Self::Path(PathFragment::ProjectFile(f)) => {
                analyzer.declarations_in(&f.file).into_iter().collect()
            }
            Self::Path(PathFragment::GitFile(f)) => {
                analyzer.declarations_in(&f.file).into_iter().collect()
            }
            Self::Path(PathFragment::Frozen(f)) | Self::Virtual(VirtualFragment::Frozen(f)) => f
                .files()
                .iter()
                .flat_map(|file| analyzer.declarations_in(file))
                .collect(),
            Self::Path(PathFragment::ExternalFile(_) | PathFragment::ImageFile(_)) => {
                BTreeSet::new()
            }
            Self::Virtual(v) => virtual_sources(v, analyzer),
        }
    }

    /// Project files this fragment touches.
    pub fn files(&self, analyzer: &dyn Analyzer) -> BTreeSet<ProjectFile> {
        match self {
            Self::Path(p) => p.files(),
            Self::Virtual(VirtualFragment::Frozen(f)) => f.files().clone(),
            Self::Virtual(_) => self
                .sources(analyzer)
                .into_iter()
                .map(|cu| cu.source().clone())
                .collect(),
        }
    }

    /// One-line table-of-contents entry shown to a model.
    pub fn format_toc(&self) -> String {
        format!(
            "<fragment-toc description=\"{}\" fragmentid=\"{}\" />",
            self.description(),
            self.id()
        )
    }
}

fn virtual_sources(v: &VirtualFragment, analyzer: &dyn Analyzer) -> BTreeSet<CodeUnit> {
    match v {
        VirtualFragment::Search(f) => f.sources().clone(),
        VirtualFragment::Stacktrace(f) => f.sources().clone(),
        VirtualFragment::Skeleton(f) => match f.skeletons() {
            Some(skeletons) => skeletons.iter().map(|(cu, _)| cu.clone()).collect(),
            None => match f.summary_type() {
                SummaryType::CodeUnitSkeleton => f
                    .targets()
                    .iter()
                    .filter_map(|t| analyzer.definition(t))
                    .collect(),
                SummaryType::FileSkeletons => analyzer
                    .all_declarations()
                    .into_iter()
                    .filter(|cu| {
                        cu.is_class() && f.targets().contains(&cu.source().display_path())
                    })
                    .collect(),
            },
        },
        VirtualFragment::Usage(f) => analyzer.definition(f.target()).into_iter().collect(),
        VirtualFragment::CallGraph(f) => analyzer.definition(f.method_name()).into_iter().collect(),
        VirtualFragment::Task(_)
        | VirtualFragment::String(_)
        | VirtualFragment::PasteText(_)
        | VirtualFragment::PasteImage(_)
        | VirtualFragment::History(_)
        | VirtualFragment::Frozen(_) => BTreeSet::new(),
    }
}
