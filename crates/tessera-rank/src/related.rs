use tessera_core::{CodeUnit, Context};
use tokio_util::sync::CancellationToken;

use crate::config::RankingConfig;
use crate::error::RankError;
use crate::hybrid::most_relevant_files;

/// Top-level classes of the `k` most relevant files, each paired with a
/// sorted, comma-joined list of its member names.
pub fn build_related_identifiers(
    ctx: &Context,
    k: usize,
    config: &RankingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<(CodeUnit, String)>, RankError> {
    let files = most_relevant_files(ctx, k, config, cancel)?;
    let analyzer = ctx.manager().analyzer();
    let mut out = Vec::new();
    for file in &files {
        for class in analyzer
            .declarations_in(file)
            .into_iter()
            .filter(|cu| cu.is_class() && !cu.short_name().contains('$'))
        {
            let mut members: Vec<String> = analyzer
                .members_of(&class)
                .iter()
                .map(|m| m.identifier().to_string())
                .collect();
            members.sort();
            members.dedup();
            out.push((class, members.join(", ")));
        }
    }
    Ok(out)
}
