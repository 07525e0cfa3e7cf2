//! Personalized PageRank over a small dense-indexed graph.

use tessera_core::Cancelled;
use tokio_util::sync::CancellationToken;

use crate::config::RankingConfig;

/// Directed graph over nodes `0..n`; `out[i]` lists the targets of node `i`.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    out: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new(n: usize) -> Self {
        Self {
            out: vec![Vec::new(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Add `from -> to`. Self-loops and duplicate edges are ignored.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if from == to || from >= self.out.len() || to >= self.out.len() {
            return;
        }
        if !self.out[from].contains(&to) {
            self.out[from].push(to);
        }
    }

    pub fn edge_count(&self) -> usize {
        self.out.iter().map(Vec::len).sum()
    }
}

/// Scores for every node, restarting into `teleport` with probability
/// `1 - damping`. `teleport` must sum to 1. Mass on nodes without out-edges
/// is spread uniformly. Stops when the L1 change drops below `epsilon` or
/// after `max_iterations`.
pub fn personalized_pagerank(
    graph: &Graph,
    teleport: &[f64],
    config: &RankingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<f64>, Cancelled> {
    let n = graph.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let d = config.damping;
    let mut rank = teleport.to_vec();
    let mut next = vec![0.0; n];

    for iteration in 0..config.max_iterations {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        next.iter_mut().for_each(|x| *x = 0.0);

        let mut dangling = 0.0;
        for (i, targets) in graph.out.iter().enumerate() {
            if targets.is_empty() {
                dangling += rank[i];
                continue;
            }
            let share = rank[i] / targets.len() as f64;
            for &j in targets {
                next[j] += d * share;
            }
        }
        let spread = d * dangling / n as f64;
        for (j, v) in next.iter_mut().enumerate() {
            *v += spread + (1.0 - d) * teleport[j];
        }

        let delta: f64 = rank.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut rank, &mut next);
        if delta < config.epsilon {
            tracing::debug!(iterations = iteration + 1, delta, "pagerank converged");
            break;
        }
    }
    Ok(rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ranks_downstream_nodes() {
        // 0 -> 1 -> 2, node 3 isolated
        let mut g = Graph::new(4);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        let teleport = [1.0, 0.0, 0.0, 0.0];
        let r = personalized_pagerank(&g, &teleport, &RankingConfig::default(), &CancellationToken::new())
            .unwrap();
        assert!(r[1] > r[3]);
        assert!(r[2] > r[3]);
        let total: f64 = r.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ignores_self_loops_and_duplicates() {
        let mut g = Graph::new(2);
        g.add_edge(0, 0);
        g.add_edge(0, 1);
        g.add_edge(0, 1);
        g.add_edge(5, 1);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn honours_cancellation() {
        let g = Graph::new(3);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = personalized_pagerank(&g, &[1.0, 0.0, 0.0], &RankingConfig::default(), &cancel);
        assert_eq!(err, Err(Cancelled));
    }

    #[test]
    fn empty_graph_yields_nothing() {
        let r = personalized_pagerank(&Graph::new(0), &[], &RankingConfig::default(), &CancellationToken::new())
            .unwrap();
        assert!(r.is_empty());
    }
}
