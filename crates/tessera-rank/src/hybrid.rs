//! Hybrid relevance: Git co-commit ranking merged with import-graph ranking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tessera_core::{Context, ProjectFile, Repository};
use tokio_util::sync::CancellationToken;

use crate::config::{MergeStrategy, RankingConfig};
use crate::error::RankError;
use crate::git_distance::related_files_by_git;
use crate::import::related_files_by_imports;
use crate::seeds::{file_seeds, FileSeeds};
use crate::RankedFile;

/// True when at least `threshold_pct` percent of `seeds` are not tracked.
/// An empty seed set is never "mostly new".
pub fn are_many_seeds_new<'a>(
    seeds: impl IntoIterator<Item = &'a ProjectFile>,
    tracked: &BTreeSet<ProjectFile>,
    threshold_pct: u32,
) -> bool {
    let (total, new) = seeds.into_iter().fold((0usize, 0usize), |(total, new), s| {
        (total + 1, new + usize::from(!tracked.contains(s)))
    });
    if total == 0 {
        return false;
    }
    new * 100 >= total * threshold_pct as usize
}

/// The repository, if Git ranking should run for these seeds.
fn usable_repo(
    repo: Option<Arc<dyn Repository>>,
    seeds: &BTreeMap<ProjectFile, f64>,
    config: &RankingConfig,
) -> Option<Arc<dyn Repository>> {
    let Some(repo) = repo else {
        tracing::debug!("no repository, git ranking disabled");
        return None;
    };
    let tracked = match repo.tracked_files() {
        Ok(tracked) => tracked,
        Err(e) => {
            tracing::warn!(error = %e, "cannot list tracked files, git ranking disabled");
            return None;
        }
    };
    if are_many_seeds_new(seeds.keys(), &tracked, config.new_seed_threshold_pct) {
        tracing::info!(
            seeds = seeds.len(),
            threshold_pct = config.new_seed_threshold_pct,
            "too many untracked seed files, git ranking disabled"
        );
        return None;
    }
    Some(repo)
}

/// Up to `k` distinct files relevant to the context, excluding its own files.
pub fn most_relevant_files(
    ctx: &Context,
    k: usize,
    config: &RankingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<ProjectFile>, RankError> {
    let analyzer = ctx.manager().analyzer();
    let seeds = file_seeds(ctx, analyzer.as_ref());
    if seeds.weights.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    // extra headroom so excluded files or overlap with git results cannot starve the merge
    let wanted = k + seeds.excluded.len();
    let git = match usable_repo(ctx.manager().repo(), &seeds.weights, config) {
        Some(repo) => related_files_by_git(repo.as_ref(), &seeds.weights, wanted, config)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "co-commit history unavailable, using imports only");
                Vec::new()
            }),
        None => Vec::new(),
    };
    let imports = related_files_by_imports(
        analyzer.as_ref(),
        &seeds.weights,
        wanted + git.len(),
        config,
        cancel,
    )?;

    Ok(merge(git, imports, config.merge_strategy, &seeds, k))
}

fn merge(
    git: Vec<RankedFile>,
    imports: Vec<RankedFile>,
    strategy: MergeStrategy,
    seeds: &FileSeeds,
    k: usize,
) -> Vec<ProjectFile> {
    let ordered: Vec<ProjectFile> = match strategy {
        MergeStrategy::GitFirst => git
            .into_iter()
            .chain(imports)
            .map(|r| r.file)
            .collect(),
        MergeStrategy::Interleave => {
            let mut out = Vec::with_capacity(git.len() + imports.len());
            let mut g = git.into_iter();
            let mut i = imports.into_iter();
            loop {
                match (g.next(), i.next()) {
                    (None, None) => break,
                    (a, b) => out.extend(a.into_iter().chain(b).map(|r| r.file)),
                }
            }
            out
        }
    };

    let mut seen = BTreeSet::new();
    ordered
        .into_iter()
        .filter(|f| !seeds.covers(f) && seen.insert(f.clone()))
        .take(k)
        .collect()
}
