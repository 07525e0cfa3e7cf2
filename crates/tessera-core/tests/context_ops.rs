use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tessera_core::fragment::{PasteTextFragment, StringFragment, UsageFragment};
use tessera_core::{
    ActionLabel, ChatMessage, Context, ContextManager, Fragment, FragmentType, OfflineManager,
    PathFragment, ProjectFile, TaskEntry, TaskResult, VirtualFragment,
};

fn manager(root: &Path) -> Arc<dyn ContextManager> {
    Arc::new(OfflineManager::new(root))
}

fn file_fragment(m: &Arc<dyn ContextManager>, rel: &str) -> PathFragment {
    let file = ProjectFile::new(m.project().root(), rel).unwrap();
    PathFragment::project_file(m.ids().next_fragment_id(), file)
}

fn note(m: &Arc<dyn ContextManager>, text: &str) -> VirtualFragment {
    VirtualFragment::String(StringFragment::new(
        m.ids().next_fragment_id(),
        text,
        "Notes",
        "markdown",
    ))
}

fn touch(path: &Path, age_secs: u64) {
    std::fs::write(path, "x").unwrap();
    let when = SystemTime::now() - Duration::from_secs(age_secs);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

#[test]
fn adding_existing_files_returns_the_same_snapshot() {
    let m = manager(Path::new("/repo"));
    let base = Context::new(Arc::clone(&m)).add_editable_files([file_fragment(&m, "src/A.java")]);

    let again = base.add_editable_files([file_fragment(&m, "src/A.java")]);
    assert!(again.is_same_snapshot(&base));

    let ro_again = base.add_readonly_files(Vec::new());
    assert!(ro_again.is_same_snapshot(&base));
}

#[test]
fn adding_files_creates_a_labelled_snapshot() {
    let m = manager(Path::new("/repo"));
    let base = Context::new(Arc::clone(&m));
    assert_eq!(base.action(), "Session start");

    let next = base.add_editable_files([
        file_fragment(&m, "src/A.java"),
        file_fragment(&m, "src/B.java"),
        file_fragment(&m, "src/A.java"),
    ]);
    assert_ne!(next.id(), base.id());
    assert_eq!(next.editable_files().len(), 2);
    assert_eq!(next.action(), "Edit A.java, B.java");
    assert!(base.editable_files().is_empty());

    let read = next.add_readonly_files([file_fragment(&m, "lib/C.java")]);
    assert_eq!(read.action(), "Read C.java");
    // untouched lists are shared, not copied
    assert_eq!(read.editable_files().as_ptr(), next.editable_files().as_ptr());
}

#[test]
fn removal_of_absent_fragments_is_a_no_op() {
    let m = manager(Path::new("/repo"));
    let base = Context::new(Arc::clone(&m)).add_editable_files([file_fragment(&m, "A.java")]);
    let same = base.remove_editable_files(&[file_fragment(&m, "Z.java")]);
    assert!(same.is_same_snapshot(&base));

    let removed = base.remove_editable_files(&[file_fragment(&m, "A.java")]);
    assert!(removed.editable_files().is_empty());
    assert_eq!(removed.action(), "Removed A.java");

    let with_note = base.add_virtual_fragment(note(&m, "todo"));
    let stranger = note(&m, "other");
    assert!(with_note
        .remove_virtual_fragments(&[stranger])
        .is_same_snapshot(&with_note));
}

#[test]
fn virtual_fragments_dedupe_by_id() {
    let m = manager(Path::new("/repo"));
    let n = note(&m, "hello");
    let ctx = Context::new(Arc::clone(&m)).add_virtual_fragment(n.clone());
    assert_eq!(ctx.action(), "Added notes");
    assert!(ctx.add_virtual_fragment(n).is_same_snapshot(&ctx));
}

#[test]
fn paste_label_follows_summary() {
    let m = manager(Path::new("/repo"));
    let (summary, resolver) = ActionLabel::pending();
    let paste = VirtualFragment::PasteText(PasteTextFragment::new(
        m.ids().next_fragment_id(),
        "{\"a\":1}",
        "json",
    ));
    let ctx = Context::new(Arc::clone(&m)).add_paste_fragment(paste, &summary);
    assert_eq!(ctx.action(), "(Summarizing)");
    resolver.resolve("json config");
    assert_eq!(ctx.action(), "Added paste of json config");
}

#[test]
fn bad_fragment_and_drop_all() {
    let m = manager(Path::new("/repo"));
    let a = file_fragment(&m, "A.java");
    let ctx = Context::new(Arc::clone(&m))
        .add_readonly_files([a.clone()])
        .add_virtual_fragment(note(&m, "n"));

    let cleaned = ctx.remove_bad_fragment(&Fragment::Path(a));
    assert!(cleaned.readonly_files().is_empty());
    assert_eq!(cleaned.action(), "Removed unreadable A.java");

    let empty = ctx.remove_all();
    assert!(empty.is_empty());
    assert_eq!(empty.action(), "Dropped all context");
}

#[test]
fn history_sequences_increase() {
    let m = manager(Path::new("/repo"));
    let ctx = Context::new(Arc::clone(&m));
    assert_eq!(ctx.next_sequence(), 1);

    let result = TaskResult::new("Fix bug", vec![ChatMessage::user("fix it")]);
    let entry = ctx.create_task_entry(&result);
    assert_eq!(entry.sequence(), 1);
    let first = ctx.add_history_entry(entry, None, "Fix bug".into(), BTreeMap::new());

    // a stale sequence is renumbered on append
    let stale = TaskEntry::from_summary(1, "earlier work").unwrap();
    let second = first.add_history_entry(stale, None, "Summarize".into(), BTreeMap::new());
    let seqs: Vec<u32> = second.task_history().iter().map(TaskEntry::sequence).collect();
    assert_eq!(seqs, vec![1, 2]);

    let cleared = second.clear_history();
    assert!(cleared.task_history().is_empty());
    assert_eq!(cleared.action(), "Cleared task history");

    let compressed = second.with_compressed_history(vec![
        TaskEntry::from_summary(5, "a").unwrap(),
        TaskEntry::from_summary(5, "b").unwrap(),
    ]);
    let seqs: Vec<u32> = compressed.task_history().iter().map(TaskEntry::sequence).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(compressed.action(), "Compressed history");
}

#[test]
fn editable_view_orders_by_mtime_and_skips_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("new.rs"), 10);
    touch(&dir.path().join("old.rs"), 1000);
    let m = manager(dir.path());

    let usage = VirtualFragment::Usage(UsageFragment::new(m.ids().next_fragment_id(), "a.b.C").unwrap());
    let ctx = Context::new(Arc::clone(&m))
        .add_editable_files([
            file_fragment(&m, "new.rs"),
            file_fragment(&m, "missing.rs"),
            file_fragment(&m, "old.rs"),
        ])
        .add_virtual_fragment(usage)
        .add_virtual_fragment(note(&m, "n"));

    let names: Vec<String> = ctx
        .editable_fragments()
        .iter()
        .map(Fragment::short_description)
        .collect();
    assert_eq!(names, vec!["uses of a.b.C", "old.rs", "new.rs"]);

    let ro: Vec<FragmentType> = ctx
        .read_only_fragments()
        .iter()
        .map(Fragment::fragment_type)
        .collect();
    assert_eq!(ro, vec![FragmentType::String]);
    assert!(ctx.editable_toc().contains("fragment-toc"));
}

#[test]
fn display_order_puts_history_first() {
    let m = manager(Path::new("/repo"));
    let ctx = Context::new(Arc::clone(&m))
        .add_editable_files([file_fragment(&m, "E.java")])
        .add_readonly_files([file_fragment(&m, "R.java")])
        .add_virtual_fragment(note(&m, "v"));
    let types: Vec<FragmentType> = ctx
        .all_fragments_in_display_order()
        .iter()
        .map(Fragment::fragment_type)
        .collect();
    assert_eq!(
        types,
        vec![FragmentType::ProjectFile, FragmentType::String, FragmentType::ProjectFile]
    );

    let entry = TaskEntry::from_summary(1, "done").unwrap();
    let with_history = ctx.add_history_entry(entry, None, "x".into(), BTreeMap::new());
    let first = with_history.all_fragments_in_display_order()[0].fragment_type();
    assert_eq!(first, FragmentType::History);
}

#[test]
fn history_fragment_id_is_stable_across_renders() {
    let m = manager(Path::new("/repo"));
    let entry = TaskEntry::from_summary(1, "done").unwrap();
    let ctx = Context::new(Arc::clone(&m)).add_history_entry(entry, None, "x".into(), BTreeMap::new());

    let before = m.ids().next_fragment_id();
    let first = ctx.all_fragments_in_display_order()[0].id();
    let second = ctx.all_fragments_in_display_order()[0].id();
    let after = m.ids().next_fragment_id();
    assert_eq!(first, second);
    assert_eq!(after.0, before.0 + 1);

    // snapshots sharing the history share the fragment
    let edited = ctx.add_virtual_fragment(note(&m, "v"));
    assert_eq!(edited.all_fragments_in_display_order()[0].id(), first);

    let compressed = ctx.with_compressed_history(ctx.task_history().to_vec());
    assert_ne!(compressed.all_fragments_in_display_order()[0].id(), first);
}

#[test]
fn reset_from_history() {
    let m = manager(Path::new("/repo"));
    let old = Context::new(Arc::clone(&m)).add_editable_files([file_fragment(&m, "Old.java")]);
    let entry = TaskEntry::from_summary(1, "done").unwrap();
    let current = old
        .remove_all()
        .add_history_entry(entry, None, "x".into(), BTreeMap::new());

    let reset = Context::create_from(&old, &current);
    assert_eq!(reset.editable_files(), old.editable_files());
    assert_eq!(reset.task_history().len(), 1);
    assert_eq!(reset.action(), "Reset context to historical state");

    let full = Context::create_from_including_history(&old, &current);
    assert!(full.task_history().is_empty());
    assert_eq!(full.action(), "Reset context and history to historical state");
}

#[test]
fn original_contents_and_relabel_keep_id() {
    let m = manager(Path::new("/repo"));
    let ctx = Context::new(Arc::clone(&m));
    let pf = ProjectFile::new("/repo", "A.java").unwrap();
    let with = ctx.with_original_contents(BTreeMap::from([(pf, "before".to_string())]));
    assert_eq!(with.id(), ctx.id());
    assert_eq!(with.original_contents().len(), 1);
    let relabelled = with.with_action("Renamed".into());
    assert_eq!(relabelled.id(), ctx.id());
    assert_eq!(relabelled.action(), "Renamed");

    let parsed = ctx.with_parsed_output(None, "Ran".into());
    assert_ne!(parsed.id(), ctx.id());
}
