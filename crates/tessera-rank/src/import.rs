//! Import-graph relevance: personalized PageRank over the project files
//! reachable from the seeds through import edges.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tessera_core::{Analyzer, Cancelled, ProjectFile};
use tokio_util::sync::CancellationToken;

use crate::config::RankingConfig;
use crate::pagerank::{personalized_pagerank, Graph};
use crate::{by_score_then_path, RankedFile};

/// Up to `k` files related to `seeds` by imports, best first. Seeds are never
/// returned. Seeds without project-internal imports yield an empty list.
pub fn related_files_by_imports(
    analyzer: &dyn Analyzer,
    seeds: &BTreeMap<ProjectFile, f64>,
    k: usize,
    config: &RankingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<RankedFile>, Cancelled> {
    let positive: BTreeMap<&ProjectFile, f64> = seeds
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .map(|(f, w)| (f, *w))
        .collect();
    if positive.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let candidates = reach(analyzer, positive.keys().copied(), config.import_reach_depth, cancel)?;
    let index: BTreeMap<&ProjectFile, usize> =
        candidates.iter().enumerate().map(|(i, f)| (f, i)).collect();

    let mut graph = Graph::new(candidates.len());
    for (i, file) in candidates.iter().enumerate() {
        for target in analyzer.imported_files(file) {
            if let Some(&j) = index.get(&target) {
                graph.add_edge(i, j);
            }
        }
    }
    if graph.edge_count() == 0 {
        tracing::debug!(seeds = positive.len(), "no project-internal imports among seeds");
        return Ok(Vec::new());
    }

    let total: f64 = positive.values().sum();
    let teleport: Vec<f64> = candidates
        .iter()
        .map(|f| positive.get(f).map_or(0.0, |w| w / total))
        .collect();
    let scores = personalized_pagerank(&graph, &teleport, config, cancel)?;

    let mut ranked: Vec<RankedFile> = candidates
        .iter()
        .zip(scores)
        .filter(|(f, score)| !positive.contains_key(f) && *score > 0.0)
        .map(|(f, score)| RankedFile {
            file: f.clone(),
            score,
        })
        .collect();
    ranked.sort_by(by_score_then_path);
    ranked.truncate(k);
    Ok(ranked)
}

/// Seeds plus every file within `depth` import hops of them.
fn reach<'a>(
    analyzer: &dyn Analyzer,
    seeds: impl Iterator<Item = &'a ProjectFile>,
    depth: usize,
    cancel: &CancellationToken,
) -> Result<BTreeSet<ProjectFile>, Cancelled> {
    let mut seen: BTreeSet<ProjectFile> = BTreeSet::new();
    let mut queue: VecDeque<(ProjectFile, usize)> = VecDeque::new();
    for seed in seeds {
        if seen.insert(seed.clone()) {
            queue.push_back((seed.clone(), 0));
        }
    }
    while let Some((file, hops)) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if hops >= depth {
            continue;
        }
        for next in analyzer.imported_files(&file) {
            if seen.insert(next.clone()) {
                queue.push_back((next, hops + 1));
            }
        }
    }
    Ok(seen)
}
