use std::path::Path;

use tessera_session::save_history;

pub fn execute(
    root: &Path,
    input: &Path,
    output: Option<&Path>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let session = crate::load_session(root, input)?;
    let output = output.unwrap_or(input);
    let contexts = session.history.flatten_contexts().len();

    if !session.migrated && output == input {
        println!("{} is already in the current format.", input.display());
        return Ok(());
    }
    if dry_run {
        println!("Dry run, no changes made.\n");
        println!("Would write {}:", output.display());
        println!("  Session: {}", session.session_id);
        println!("  Steps: {}", session.history.len());
        println!("  Contexts: {contexts}");
        return Ok(());
    }

    save_history(output, &session.session_id, &session.history)?;
    tracing::info!(input = %input.display(), output = %output.display(), "session rewritten");
    println!("Migration complete:");
    println!("  Session: {}", session.session_id);
    println!("  Steps: {}", session.history.len());
    println!("  Contexts: {contexts}");
    println!("  Written: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tessera_core::{Context, ContextManager, OfflineManager};

    use super::*;

    #[test]
    fn legacy_file_is_rewritten_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let m: Arc<dyn ContextManager> = Arc::new(OfflineManager::new(dir.path()));
        let ctx = Context::new(m);
        let path = dir.path().join("legacy.json");
        let legacy = serde_json::json!({ "contexts": [ctx.to_dto()] });
        fs::write(&path, legacy.to_string()).unwrap();

        execute(dir.path(), &path, None, true).unwrap();
        assert!(!fs::read_to_string(&path).unwrap().contains("\"steps\""));

        execute(dir.path(), &path, None, false).unwrap();
        let rewritten: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten["version"], 1);
        assert_eq!(rewritten["steps"].as_array().map(Vec::len), Some(1));

        let reloaded = crate::load_session(dir.path(), &path).unwrap();
        assert!(!reloaded.migrated);
        assert_eq!(reloaded.history.flatten_contexts()[0].id(), ctx.id());
    }
}
