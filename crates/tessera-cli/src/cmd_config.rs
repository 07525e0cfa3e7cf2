use std::path::Path;

use tessera_rank::RankingConfig;

pub fn execute(file: Option<&Path>) -> anyhow::Result<()> {
    let config = effective(file)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// File (or defaults) with `TESSERA_*` environment overrides on top.
fn effective(file: Option<&Path>) -> anyhow::Result<RankingConfig> {
    let base = match file {
        Some(path) => RankingConfig::load(path)?,
        None => RankingConfig::default(),
    };
    Ok(base.with_env_overrides())
}
