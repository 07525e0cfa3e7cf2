//! Conversion of a flat, pre-timeline list of contexts into session steps.

use tessera_core::Context;

use crate::error::SessionError;
use crate::history::SessionHistory;
use crate::step::SessionStep;

/// One manual step per legacy context, in order. Contexts are frozen first,
/// dropping any fragment that cannot be captured.
pub fn migrate_legacy(
    contexts: impl IntoIterator<Item = Context>,
) -> Result<SessionHistory, SessionError> {
    let mut history = SessionHistory::default();
    let mut refrozen = 0usize;
    for ctx in contexts {
        let frozen = if ctx.is_frozen() {
            ctx
        } else {
            refrozen += 1;
            ctx.freeze_and_cleanup()
        };
        if !frozen.is_frozen() {
            return Err(SessionError::CleanupFailed(frozen.id()));
        }
        history.push(SessionStep::manual(frozen)?);
    }
    tracing::info!(steps = history.len(), refrozen, "migrated legacy context history");
    Ok(history)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_core::{ContextManager, OfflineManager, PathFragment};

    use super::*;

    #[test]
    fn each_context_becomes_a_frozen_manual_step() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        let m: Arc<dyn ContextManager> = Arc::new(OfflineManager::new(dir.path()));
        let present = m.project().file("A.java").unwrap();
        let missing = m.project().file("Gone.java").unwrap();

        let c1 = Context::new(m.clone());
        let c2 = c1.add_editable_files([
            PathFragment::project_file(m.ids().next_fragment_id(), present),
            PathFragment::project_file(m.ids().next_fragment_id(), missing),
        ]);
        let history = migrate_legacy([c1.clone(), c2.clone()]).unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.steps().iter().all(SessionStep::is_manual));
        let flat = history.flatten_contexts();
        assert_eq!(flat[0].id(), c1.id());
        assert_eq!(flat[1].id(), c2.id());
        assert!(flat.iter().all(Context::is_frozen));
        // the unreadable file is dropped, the readable one captured
        assert_eq!(flat[1].editable_files().len(), 1);
    }

    #[test]
    fn empty_legacy_history_migrates_to_empty_timeline() {
        assert!(migrate_legacy(Vec::<Context>::new()).unwrap().is_empty());
    }
}
