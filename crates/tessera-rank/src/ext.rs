use tessera_core::fragment::SkeletonFragment;
use tessera_core::{CodeUnit, Context, ProjectFile};
use tokio_util::sync::CancellationToken;

use crate::auto_context::build_auto_context_from_seeds;
use crate::config::RankingConfig;
use crate::error::RankError;
use crate::hybrid::most_relevant_files;
use crate::related::build_related_identifiers;
use crate::seeds::code_unit_seeds;

/// Ranking operations on a context snapshot.
pub trait RelevanceExt {
    /// Up to `k` distinct files relevant to this context, never its own files.
    fn most_relevant_files(
        &self,
        k: usize,
        config: &RankingConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProjectFile>, RankError>;

    /// Skeletons of the `k` code units most relevant to this context.
    fn build_auto_context(
        &self,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<SkeletonFragment, RankError>;

    fn build_related_identifiers(
        &self,
        k: usize,
        config: &RankingConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<(CodeUnit, String)>, RankError>;
}

impl RelevanceExt for Context {
    fn most_relevant_files(
        &self,
        k: usize,
        config: &RankingConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProjectFile>, RankError> {
        most_relevant_files(self, k, config, cancel)
    }

    fn build_auto_context(
        &self,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<SkeletonFragment, RankError> {
        let manager = self.manager();
        let analyzer = manager.analyzer();
        let seeds = code_unit_seeds(self, analyzer.as_ref());
        Ok(build_auto_context_from_seeds(
            analyzer.as_ref(),
            &seeds.weights,
            &seeds.excluded,
            k,
            manager.ids(),
            cancel,
        )?)
    }

    fn build_related_identifiers(
        &self,
        k: usize,
        config: &RankingConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<(CodeUnit, String)>, RankError> {
        build_related_identifiers(self, k, config, cancel)
    }
}
