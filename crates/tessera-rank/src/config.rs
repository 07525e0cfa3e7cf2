use std::path::Path;
use std::str::FromStr;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NEW_SEED_THRESHOLD_PCT: u32 = 30;
pub const DEFAULT_IMPORT_REACH_DEPTH: usize = 2;
pub const DEFAULT_DAMPING: f64 = 0.85;
pub const DEFAULT_EPSILON: f64 = 1e-6;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// How Git and import rankings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// All Git results, then import results not already present.
    #[default]
    GitFirst,
    /// Alternate Git and import results, Git first.
    Interleave,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "git_first" => Ok(Self::GitFirst),
            "interleave" => Ok(Self::Interleave),
            other => Err(format!("unknown merge strategy '{other}'")),
        }
    }
}

/// Tunables for relevance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Git ranking is disabled when at least this percentage of seed files
    /// is untracked.
    pub new_seed_threshold_pct: u32,
    /// Breadth-first import hops explored from the seeds.
    pub import_reach_depth: usize,
    pub damping: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Cap on commits scanned for co-commit scoring; `None` scans all.
    pub max_commits: Option<usize>,
    pub merge_strategy: MergeStrategy,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            new_seed_threshold_pct: DEFAULT_NEW_SEED_THRESHOLD_PCT,
            import_reach_depth: DEFAULT_IMPORT_REACH_DEPTH,
            damping: DEFAULT_DAMPING,
            epsilon: DEFAULT_EPSILON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_commits: None,
            merge_strategy: MergeStrategy::GitFirst,
        }
    }
}

impl RankingConfig {
    /// Read a JSON config file; missing keys take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading ranking config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing ranking config {}", path.display()))?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `TESSERA_*` environment overrides. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("TESSERA_NEW_SEED_THRESHOLD_PCT") {
            self.new_seed_threshold_pct = v;
        }
        if let Some(v) = env_parse("TESSERA_IMPORT_REACH_DEPTH") {
            self.import_reach_depth = v;
        }
        if let Some(v) = env_parse("TESSERA_PAGERANK_MAX_ITERS") {
            self.max_iterations = v;
        }
        if let Some(v) = env_parse("TESSERA_MAX_COMMITS") {
            self.max_commits = Some(v);
        }
        if let Some(v) = env_parse("TESSERA_MERGE_STRATEGY") {
            self.merge_strategy = v;
        }
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RankingConfig::default();
        assert_eq!(c.new_seed_threshold_pct, 30);
        assert_eq!(c.import_reach_depth, 2);
        assert_eq!(c.max_iterations, 100);
        assert_eq!(c.max_commits, None);
        assert_eq!(c.merge_strategy, MergeStrategy::GitFirst);
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.json");
        std::fs::write(
            &path,
            r#"{"import_reach_depth": 3, "merge_strategy": "interleave"}"#,
        )
        .unwrap();
        let c = RankingConfig::load(&path).unwrap();
        assert_eq!(c.import_reach_depth, 3);
        assert_eq!(c.merge_strategy, MergeStrategy::Interleave);
        assert_eq!(c.new_seed_threshold_pct, 30);
    }

    #[test]
    fn load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = RankingConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("parsing ranking config"));
    }

    #[test]
    fn merge_strategy_parses_loosely() {
        assert_eq!("Git-First".parse::<MergeStrategy>(), Ok(MergeStrategy::GitFirst));
        assert!("random".parse::<MergeStrategy>().is_err());
    }
}
