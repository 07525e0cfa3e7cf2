//! Co-commit relevance from version-control history.

use std::collections::{BTreeMap, BTreeSet};

use tessera_core::{ProjectFile, RepoError, Repository};

use crate::config::RankingConfig;
use crate::{by_score_then_path, RankedFile};

/// Up to `k` files most often committed together with `seeds`, best first.
///
/// Each commit that touches a seed adds `seed_weight / files_in_commit` to
/// every non-seed file it also changed, so sweeping commits count for less.
pub fn related_files_by_git(
    repo: &dyn Repository,
    seeds: &BTreeMap<ProjectFile, f64>,
    k: usize,
    config: &RankingConfig,
) -> Result<Vec<RankedFile>, RepoError> {
    if seeds.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let history = repo.co_commit_history(config.max_commits)?;

    let mut scores: BTreeMap<ProjectFile, f64> = BTreeMap::new();
    for commit in &history {
        let files: BTreeSet<&ProjectFile> = commit.files.iter().collect();
        if files.is_empty() {
            continue;
        }
        let seed_weight: f64 = files
            .iter()
            .filter_map(|f| seeds.get(*f))
            .filter(|w| **w > 0.0)
            .sum();
        if seed_weight <= 0.0 {
            continue;
        }
        let contribution = seed_weight / files.len() as f64;
        for file in files.iter().filter(|f| !seeds.contains_key(**f)) {
            *scores.entry((*file).clone()).or_insert(0.0) += contribution;
        }
    }

    let mut ranked: Vec<RankedFile> = scores
        .into_iter()
        .map(|(file, score)| RankedFile { file, score })
        .collect();
    ranked.sort_by(by_score_then_path);
    ranked.truncate(k);
    tracing::debug!(commits = history.len(), results = ranked.len(), "co-commit ranking");
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use tessera_core::testing::StubRepository;

    use super::*;

    fn pf(rel: &str) -> ProjectFile {
        ProjectFile::new("/repo", rel).unwrap()
    }

    #[test]
    fn small_commits_count_more_than_sweeping_ones() {
        let (a, near, far, x, y) = (pf("A"), pf("Near"), pf("Far"), pf("X"), pf("Y"));
        let repo = StubRepository::new()
            .with_commit("c1", &[&a, &near])
            .with_commit("c2", &[&a, &far, &x, &y]);
        let seeds = BTreeMap::from([(a.clone(), 1.0)]);
        let out = related_files_by_git(&repo, &seeds, 10, &RankingConfig::default()).unwrap();
        assert_eq!(out[0].file, near);
        assert!((out[0].score - 0.5).abs() < 1e-12);
        assert!(out.iter().all(|r| r.file != a));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn commits_without_seeds_contribute_nothing() {
        let (a, b, c) = (pf("A"), pf("B"), pf("C"));
        let repo = StubRepository::new().with_commit("c1", &[&b, &c]);
        let seeds = BTreeMap::from([(a, 1.0)]);
        let out = related_files_by_git(&repo, &seeds, 10, &RankingConfig::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn commit_limit_is_forwarded() {
        let (a, b, c) = (pf("A"), pf("B"), pf("C"));
        let repo = StubRepository::new()
            .with_commit("new", &[&a, &b])
            .with_commit("old", &[&a, &c]);
        let seeds = BTreeMap::from([(a, 1.0)]);
        let config = RankingConfig {
            max_commits: Some(1),
            ..RankingConfig::default()
        };
        let out = related_files_by_git(&repo, &seeds, 10, &config).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file, b);
    }

    #[test]
    fn history_errors_propagate() {
        let repo = StubRepository::new().failing_history();
        let seeds = BTreeMap::from([(pf("A"), 1.0)]);
        assert!(related_files_by_git(&repo, &seeds, 3, &RankingConfig::default()).is_err());
    }
}
