use std::fs;
use std::sync::Arc;

use tessera_core::{
    ChatMessage, Context, ContextId, ContextManager, FragmentType, MessageRole, OfflineManager,
    PathFragment, StopReason, TaskResult,
};
use tessera_session::{
    load_history, new_session_id, save_history, SessionEvent, SessionHistory, SessionStep,
    UndoStack,
};

fn manager(root: &std::path::Path) -> Arc<dyn ContextManager> {
    Arc::new(OfflineManager::new(root))
}

/// A context editing `rel`, which must exist under the manager's root.
fn editing(m: &Arc<dyn ContextManager>, base: &Context, rel: &str) -> Context {
    let file = m.project().file(rel).unwrap();
    base.add_editable_files([PathFragment::project_file(m.ids().next_fragment_id(), file)])
}

#[test]
fn saved_timeline_loads_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A.java"), "class A {}").unwrap();
    let m = manager(dir.path());

    let welcome = Context::new(m.clone());
    let edited = editing(&m, &welcome, "A.java").freeze_and_cleanup();
    let answered = edited.clear_history();
    let result = TaskResult::new(
        "Explain A",
        vec![ChatMessage::user("what is A?"), ChatMessage::assistant("a class")],
    )
    .with_stop_reason(StopReason::Interrupted);

    let history = SessionHistory::new(vec![
        SessionStep::manual(welcome.clone()).unwrap(),
        SessionStep::manual(edited.clone()).unwrap(),
        SessionStep::new(
            Some(SessionEvent::new(edited.id(), result)),
            vec![answered.clone()],
        )
        .unwrap(),
        SessionStep::new(Some(SessionEvent::new(answered.id(), TaskResult::new("Ask", vec![]))), vec![])
            .unwrap(),
    ]);

    let path = dir.path().join("sessions").join("main.json");
    let session_id = new_session_id();
    save_history(&path, &session_id, &history).unwrap();
    assert!(dir.path().join("sessions").join("main.json.lock").exists());

    // remove the file so only the frozen capture can supply its content
    fs::remove_file(dir.path().join("A.java")).unwrap();
    let loaded = load_history(&path, manager(dir.path())).unwrap();

    assert_eq!(loaded.session_id, session_id);
    assert!(!loaded.migrated);
    assert!(loaded.saved_at.is_some());
    assert_eq!(loaded.history.len(), 4);

    let ids: Vec<ContextId> = loaded.history.flatten_contexts().iter().map(Context::id).collect();
    assert_eq!(ids, vec![welcome.id(), edited.id(), answered.id()]);

    let restored = loaded.history.context(edited.id()).unwrap();
    assert!(restored.is_frozen());
    let frozen = match &restored.editable_files()[0] {
        PathFragment::Frozen(f) => f,
        other => panic!("expected frozen fragment, got {other:?}"),
    };
    assert_eq!(frozen.original_type(), FragmentType::ProjectFile);
    assert_eq!(frozen.text(), Some("class A {}"));
    assert_eq!(restored.action(), edited.action());

    let ai_step = loaded.history.step_for_context(answered.id()).unwrap();
    let event = ai_step.event().unwrap();
    assert_eq!(event.before_context, edited.id());
    assert_eq!(event.result.action_description, "Explain A");
    assert_eq!(event.result.stop_reason, StopReason::Interrupted);
    assert_eq!(event.result.messages[1].role, MessageRole::Assistant);
    assert!(event.result.original_contents.is_empty());

    assert!(loaded.history.steps()[3].contexts().is_empty());

    let stack = UndoStack::from_history(&loaded.history).unwrap();
    assert_eq!(stack.top().id(), answered.id());
}

#[test]
fn fresh_ids_do_not_collide_with_loaded_ones() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(dir.path());
    let history = SessionHistory::new(vec![SessionStep::manual(Context::new(m.clone())).unwrap()]);
    let path = dir.path().join("s.json");
    save_history(&path, &new_session_id(), &history).unwrap();

    let fresh = manager(dir.path());
    let loaded = load_history(&path, fresh.clone()).unwrap();
    let loaded_id = loaded.history.flatten_contexts()[0].id();
    assert!(Context::new(fresh).id() > loaded_id);
}

#[test]
fn legacy_file_is_migrated_into_manual_steps() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A.java"), "class A {}").unwrap();
    let m = manager(dir.path());
    let first = Context::new(m.clone());
    let second = editing(&m, &first, "A.java");
    assert!(!second.is_frozen());

    let legacy = serde_json::json!({ "contexts": [first.to_dto(), second.to_dto()] });
    let path = dir.path().join("legacy.json");
    fs::write(&path, legacy.to_string()).unwrap();

    let loaded = load_history(&path, manager(dir.path())).unwrap();
    assert!(loaded.migrated);
    assert!(loaded.saved_at.is_none());
    assert!(loaded.session_id.starts_with("ses_"));
    assert_eq!(loaded.history.len(), 2);
    assert!(loaded.history.steps().iter().all(SessionStep::is_manual));

    let flat = loaded.history.flatten_contexts();
    assert_eq!(flat[1].id(), second.id());
    assert!(flat.iter().all(Context::is_frozen));
    assert_eq!(flat[1].editable_files().len(), 1);
}
