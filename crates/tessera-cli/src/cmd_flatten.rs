use std::fmt::Write as _;
use std::path::Path;

use tessera_session::SessionHistory;

pub fn execute(root: &Path, file: &Path, toc: bool) -> anyhow::Result<()> {
    let session = crate::load_session(root, file)?;
    if session.history.is_empty() {
        println!("No contexts in session.");
        return Ok(());
    }
    print!("{}", render(&session.history, toc));
    Ok(())
}

fn render(history: &SessionHistory, toc: bool) -> String {
    let mut out = String::new();
    for (i, ctx) in history.flatten_contexts().iter().enumerate() {
        let _ = writeln!(out, "{:>4}  {}  {}", i + 1, ctx.id(), ctx.action());
        if !toc {
            continue;
        }
        for line in ctx.editable_toc().lines().chain(ctx.read_only_toc().lines()) {
            let _ = writeln!(out, "        {line}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_core::fragment::StringFragment;
    use tessera_core::{Context, ContextManager, OfflineManager, TaskResult, VirtualFragment};
    use tessera_session::{SessionEvent, SessionStep};

    use super::*;

    #[test]
    fn lists_contexts_in_timeline_order() {
        let m: Arc<dyn ContextManager> = Arc::new(OfflineManager::new("/repo"));
        let c1 = Context::new(m.clone());
        let c2 = c1.clear_history();
        let c3 = c2.clear_history();
        let history = SessionHistory::new(vec![
            SessionStep::manual(c1.clone()).unwrap(),
            SessionStep::new(
                Some(SessionEvent::new(c1.id(), TaskResult::new("Code", vec![]))),
                vec![c2.clone(), c3.clone()],
            )
            .unwrap(),
        ]);

        let text = render(&history, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(&c1.id().to_string()));
        assert!(lines[1].contains(&c2.id().to_string()));
        assert!(lines[2].contains(&c3.id().to_string()));
    }

    #[test]
    fn toc_lists_fragments_under_each_context() {
        let m: Arc<dyn ContextManager> = Arc::new(OfflineManager::new("/repo"));
        let note = StringFragment::new(m.ids().next_fragment_id(), "notes", "Build notes", "none");
        let ctx = Context::new(m.clone()).add_virtual_fragment(VirtualFragment::String(note));
        let history = SessionHistory::new(vec![SessionStep::manual(ctx).unwrap()]);

        let text = render(&history, true);
        assert!(text.contains("<fragment-toc description=\"Build notes\""));
    }
}
