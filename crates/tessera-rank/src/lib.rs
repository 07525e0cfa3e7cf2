pub mod auto_context;
pub mod config;
pub mod error;
pub mod ext;
pub mod git_distance;
pub mod hybrid;
pub mod import;
pub mod pagerank;
pub mod related;
pub mod seeds;

use std::cmp::Ordering;

use tessera_core::ProjectFile;

pub use auto_context::build_auto_context_from_seeds;
pub use config::{MergeStrategy, RankingConfig};
pub use error::RankError;
pub use git_distance::related_files_by_git;
pub use ext::RelevanceExt;
pub use hybrid::{are_many_seeds_new, most_relevant_files};
pub use import::related_files_by_imports;
pub use related::build_related_identifiers;

/// A file with its relevance score from one ranking signal.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFile {
    pub file: ProjectFile,
    pub score: f64,
}

/// Score descending, then case-insensitive path ascending.
pub(crate) fn by_score_then_path(a: &RankedFile, b: &RankedFile) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            a.file
                .display_path()
                .to_lowercase()
                .cmp(&b.file.display_path().to_lowercase())
        })
        .then_with(|| a.file.cmp(&b.file))
}
