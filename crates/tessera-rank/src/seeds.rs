//! Seed weights derived from the fragments of a context.
//!
//! Editable fragments weigh 1.0 each. Read-only and virtual fragments share
//! a weight of `1 / (read-only count + virtual count)`. Weights reached
//! through several fragments are summed.

use std::collections::{BTreeMap, BTreeSet};

use tessera_core::{Analyzer, CodeUnit, Context, Fragment, ProjectFile, WeightedSeeds};

/// Seeds keyed by code unit, plus the units sourced by fragments that opted
/// out of auto-context.
#[derive(Debug, Clone, Default)]
pub struct CodeUnitSeeds {
    pub weights: WeightedSeeds,
    pub excluded: BTreeSet<String>,
}

fn weighted_fragments(ctx: &Context) -> impl Iterator<Item = (Fragment, f64)> + '_ {
    let others = ctx.readonly_files().len() + ctx.virtual_fragments().len();
    let other_weight = if others == 0 { 0.0 } else { 1.0 / others as f64 };
    ctx.editable_files()
        .iter()
        .cloned()
        .map(|f| (Fragment::Path(f), 1.0))
        .chain(
            ctx.readonly_files()
                .iter()
                .cloned()
                .map(move |f| (Fragment::Path(f), other_weight)),
        )
        .chain(
            ctx.virtual_fragments()
                .iter()
                .cloned()
                .map(move |f| (Fragment::Virtual(f), other_weight)),
        )
}

/// Code-unit seeds for auto-context.
pub fn code_unit_seeds(ctx: &Context, analyzer: &dyn Analyzer) -> CodeUnitSeeds {
    let mut seeds = CodeUnitSeeds::default();
    for (fragment, weight) in weighted_fragments(ctx) {
        let sources = fragment.sources(analyzer);
        if !fragment.is_eligible_for_auto_context() {
            seeds.excluded.extend(sources.iter().map(CodeUnit::fq_name));
            continue;
        }
        for cu in sources {
            *seeds.weights.entry(cu.fq_name()).or_insert(0.0) += weight;
        }
    }
    seeds
}

/// Seeds keyed by file, plus the files of fragments that opted out of
/// auto-context. Both are already in the context and never recommended.
#[derive(Debug, Clone, Default)]
pub struct FileSeeds {
    pub weights: BTreeMap<ProjectFile, f64>,
    pub excluded: BTreeSet<ProjectFile>,
}

impl FileSeeds {
    pub fn covers(&self, file: &ProjectFile) -> bool {
        self.weights.contains_key(file) || self.excluded.contains(file)
    }
}

/// File seeds for the relevance ranker.
pub fn file_seeds(ctx: &Context, analyzer: &dyn Analyzer) -> FileSeeds {
    let mut seeds = FileSeeds::default();
    for (fragment, weight) in weighted_fragments(ctx) {
        let files = fragment.files(analyzer);
        if !fragment.is_eligible_for_auto_context() {
            seeds.excluded.extend(files);
            continue;
        }
        for file in files {
            *seeds.weights.entry(file).or_insert(0.0) += weight;
        }
    }
    seeds
}
