//! Auto-context: skeletons of the code units PageRank considers most
//! relevant to the current context.

use std::collections::BTreeSet;

use tessera_core::code_unit::top_level_name;
use tessera_core::fragment::SkeletonFragment;
use tessera_core::{Analyzer, Cancelled, IdGenerator, WeightedSeeds};
use tokio_util::sync::CancellationToken;

/// Skeletons of up to `k` units ranked from `seeds`, in rank order.
///
/// Units named in `excluded`, or nested inside an excluded class, are
/// skipped, as are units whose source file cannot be resolved. Empty seeds
/// give an empty fragment without consulting the analyzer.
pub fn build_auto_context_from_seeds(
    analyzer: &dyn Analyzer,
    seeds: &WeightedSeeds,
    excluded: &BTreeSet<String>,
    k: usize,
    ids: &IdGenerator,
    cancel: &CancellationToken,
) -> Result<SkeletonFragment, Cancelled> {
    if seeds.is_empty() || k == 0 {
        return Ok(SkeletonFragment::materialized(ids.next_fragment_id(), Vec::new()));
    }

    let ranked = analyzer.rank(seeds, cancel)?;
    let mut picked = Vec::new();
    let mut seen = BTreeSet::new();
    for cu in ranked {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let fq_name = cu.fq_name();
        if analyzer.file_for(&fq_name).is_none() {
            tracing::warn!(unit = %fq_name, "ranked code unit has no source file, skipping");
            continue;
        }
        if excluded.contains(&fq_name) || excluded.contains(top_level_name(&fq_name)) {
            continue;
        }
        if !seen.insert(fq_name.clone()) {
            continue;
        }
        if let Some(skeleton) = analyzer.skeleton(&fq_name) {
            picked.push((cu, skeleton));
            if picked.len() >= k {
                break;
            }
        }
    }
    tracing::debug!(seeds = seeds.len(), picked = picked.len(), "auto-context built");
    Ok(SkeletonFragment::materialized(ids.next_fragment_id(), picked))
}

#[cfg(test)]
mod tests {
    use tessera_core::testing::{class_unit, StubAnalyzer};
    use tessera_core::{CodeUnit, CodeUnitKind, ProjectFile};

    use super::*;

    fn pf(rel: &str) -> ProjectFile {
        ProjectFile::new("/repo", rel).unwrap()
    }

    #[test]
    fn empty_seeds_give_empty_skeleton() {
        let analyzer = StubAnalyzer::new();
        let out = build_auto_context_from_seeds(
            &analyzer,
            &WeightedSeeds::new(),
            &BTreeSet::new(),
            10,
            &IdGenerator::new(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(out.is_empty());
        assert!(out.is_materialized());
        assert!(analyzer.last_seeds().is_none());
    }

    #[test]
    fn walks_rank_order_skipping_excluded_and_unresolved() {
        let a = class_unit(&pf("A.java"), "p.A").unwrap();
        let b = class_unit(&pf("B.java"), "p.B").unwrap();
        let nested = CodeUnit::new(pf("Ex.java"), CodeUnitKind::Class, "p", "Ex$Inner").unwrap();
        let ghost = class_unit(&pf("Ghost.java"), "p.Ghost").unwrap();
        let c = class_unit(&pf("C.java"), "p.C").unwrap();
        let analyzer = StubAnalyzer::new()
            .with_declaration(a.clone())
            .with_declaration(b.clone())
            .with_declaration(nested.clone())
            .with_declaration(c.clone())
            .with_skeleton("p.A", "class A {}")
            .with_skeleton("p.B", "class B {}")
            .with_skeleton("p.Ex$Inner", "class Inner {}")
            .with_skeleton("p.C", "class C {}")
            .with_ranking(vec![ghost, nested, b.clone(), a.clone(), c]);

        let seeds = WeightedSeeds::from([("p.A".to_string(), 1.0)]);
        let excluded = BTreeSet::from(["p.Ex".to_string()]);
        let out = build_auto_context_from_seeds(
            &analyzer,
            &seeds,
            &excluded,
            2,
            &IdGenerator::new(),
            &CancellationToken::new(),
        )
        .unwrap();

        let names: Vec<String> = out
            .skeletons()
            .unwrap()
            .iter()
            .map(|(cu, _)| cu.fq_name())
            .collect();
        assert_eq!(names, vec!["p.B", "p.A"]);
        assert_eq!(out.targets(), ["p.B".to_string(), "p.A".to_string()]);
    }

    #[test]
    fn large_k_is_honoured() {
        let units: Vec<CodeUnit> = (0..150)
            .map(|i| class_unit(&pf(&format!("F{i}.java")), &format!("p.F{i}")).unwrap())
            .collect();
        let mut analyzer = StubAnalyzer::new().with_ranking(units.clone());
        for cu in &units {
            analyzer = analyzer
                .with_declaration(cu.clone())
                .with_skeleton(&cu.fq_name(), "class F {}");
        }

        let seeds = WeightedSeeds::from([("p.F0".to_string(), 1.0)]);
        let out = build_auto_context_from_seeds(
            &analyzer,
            &seeds,
            &BTreeSet::new(),
            150,
            &IdGenerator::new(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(out.targets().len(), 150);
        assert_eq!(out.targets()[149], "p.F149");
    }

    #[test]
    fn cancellation_surfaces() {
        let analyzer = StubAnalyzer::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let seeds = WeightedSeeds::from([("p.A".to_string(), 1.0)]);
        let err = build_auto_context_from_seeds(
            &analyzer,
            &seeds,
            &BTreeSet::new(),
            5,
            &IdGenerator::new(),
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err, Cancelled);
    }
}
