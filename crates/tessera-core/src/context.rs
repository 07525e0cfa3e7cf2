//! Immutable context snapshots.
//!
//! Every mutating operation returns a new [`Context`]; list storage is
//! shared between snapshots until one of them changes it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::action::ActionLabel;
use crate::capability::ContextManager;
use crate::file::ProjectFile;
use crate::fragment::{Fragment, FragmentType, HistoryFragment, PathFragment, TaskFragment, VirtualFragment};
use crate::ids::{ContextId, FragmentId};
use crate::task::{ChatMessage, TaskEntry, TaskResult};

pub const WELCOME_ACTION: &str = "Session start";
pub const WELCOME_SESSION: &str = "Welcome";

#[derive(Clone)]
pub struct Context {
    id: ContextId,
    manager: Arc<dyn ContextManager>,
    editable: Arc<Vec<PathFragment>>,
    readonly: Arc<Vec<PathFragment>>,
    virtuals: Arc<Vec<VirtualFragment>>,
    task_history: Arc<Vec<TaskEntry>>,
    // id of the History fragment shown for `task_history`; set with it
    history_id: Option<FragmentId>,
    original_contents: Arc<BTreeMap<ProjectFile, String>>,
    parsed_output: Option<Arc<TaskFragment>>,
    action: ActionLabel,
}

/// Raw parts of a snapshot, used when rebuilding one from storage.
pub struct ContextParts {
    pub id: ContextId,
    pub editable: Vec<PathFragment>,
    pub readonly: Vec<PathFragment>,
    pub virtuals: Vec<VirtualFragment>,
    pub task_history: Vec<TaskEntry>,
    pub parsed_output: Option<TaskFragment>,
    pub action: ActionLabel,
}

impl Context {
    /// An empty snapshot labelled as the start of a session.
    pub fn new(manager: Arc<dyn ContextManager>) -> Self {
        let id = manager.ids().next_context_id();
        Self {
            id,
            manager,
            editable: Arc::default(),
            readonly: Arc::default(),
            virtuals: Arc::default(),
            task_history: Arc::default(),
            history_id: None,
            original_contents: Arc::default(),
            parsed_output: None,
            action: ActionLabel::resolved(WELCOME_ACTION),
        }
    }

    /// Like [`Context::new`], with `welcome` shown as the initial output.
    pub fn welcome(manager: Arc<dyn ContextManager>, welcome: impl Into<String>) -> Self {
        let mut ctx = Self::new(manager);
        let fragment_id = ctx.manager.ids().next_fragment_id();
        ctx.parsed_output = Some(Arc::new(TaskFragment::new(
            fragment_id,
            vec![ChatMessage::system(welcome)],
            WELCOME_SESSION,
        )));
        ctx
    }

    /// Rebuild a snapshot with a known id. Duplicate path fragments are dropped
    /// and the manager's id generator is advanced past every id seen.
    pub fn from_parts(manager: Arc<dyn ContextManager>, parts: ContextParts) -> Self {
        let ids = manager.ids();
        ids.observe_context_id(parts.id);
        for id in parts
            .editable
            .iter()
            .chain(parts.readonly.iter())
            .map(PathFragment::id)
            .chain(parts.virtuals.iter().map(VirtualFragment::id))
            .chain(parts.parsed_output.iter().map(TaskFragment::id))
            .chain(
                parts
                    .task_history
                    .iter()
                    .filter_map(|e| e.log().map(TaskFragment::id)),
            )
        {
            ids.observe_fragment_id(id);
        }
        let task_history = normalize_sequences(parts.task_history);
        let history_id = history_id(&manager, &task_history);
        Self {
            id: parts.id,
            manager,
            editable: Arc::new(dedup(parts.editable)),
            readonly: Arc::new(dedup(parts.readonly)),
            virtuals: Arc::new(dedup(parts.virtuals)),
            task_history: Arc::new(task_history),
            history_id,
            original_contents: Arc::default(),
            parsed_output: parts.parsed_output.map(Arc::new),
            action: parts.action,
        }
    }

    // ── Accessors ──

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn manager(&self) -> &Arc<dyn ContextManager> {
        &self.manager
    }

    pub fn editable_files(&self) -> &[PathFragment] {
        &self.editable
    }

    pub fn readonly_files(&self) -> &[PathFragment] {
        &self.readonly
    }

    pub fn virtual_fragments(&self) -> &[VirtualFragment] {
        &self.virtuals
    }

    pub fn task_history(&self) -> &[TaskEntry] {
        &self.task_history
    }

    pub fn original_contents(&self) -> &BTreeMap<ProjectFile, String> {
        &self.original_contents
    }

    pub fn parsed_output(&self) -> Option<&TaskFragment> {
        self.parsed_output.as_deref()
    }

    pub fn action_label(&self) -> &ActionLabel {
        &self.action
    }

    /// Current action text; never blocks on a pending label.
    pub fn action(&self) -> String {
        self.action.text()
    }

    /// True when both values are the same snapshot with shared storage.
    pub fn is_same_snapshot(&self, other: &Context) -> bool {
        self.id == other.id
            && Arc::ptr_eq(&self.editable, &other.editable)
            && Arc::ptr_eq(&self.readonly, &other.readonly)
            && Arc::ptr_eq(&self.virtuals, &other.virtuals)
            && Arc::ptr_eq(&self.task_history, &other.task_history)
    }

    /// No fragments in any list and no task history.
    pub fn is_empty(&self) -> bool {
        self.editable.is_empty()
            && self.readonly.is_empty()
            && self.virtuals.is_empty()
            && self.task_history.is_empty()
    }

    /// No fragment reads live data.
    pub fn is_frozen(&self) -> bool {
        !self
            .editable
            .iter()
            .chain(self.readonly.iter())
            .any(PathFragment::is_dynamic)
            && !self.virtuals.iter().any(VirtualFragment::is_dynamic)
    }

    /// Editable, then read-only, then virtual fragments.
    pub fn all_fragments(&self) -> impl Iterator<Item = Fragment> + '_ {
        self.editable
            .iter()
            .cloned()
            .map(Fragment::Path)
            .chain(self.readonly.iter().cloned().map(Fragment::Path))
            .chain(self.virtuals.iter().cloned().map(Fragment::Virtual))
    }

    /// Usage fragments, then editable files ordered by modification time.
    /// Files whose mtime cannot be read are left out.
    pub fn editable_fragments(&self) -> Vec<Fragment> {
        let mut with_mtime: Vec<(SystemTime, &PathFragment)> = self
            .editable
            .iter()
            .filter_map(|f| match f.mtime() {
                Ok(t) => Some((t, f)),
                Err(e) => {
                    tracing::warn!(file = %f.description(), error = %e, "skipping file with unreadable mtime");
                    None
                }
            })
            .collect();
        with_mtime.sort_by_key(|(t, _)| *t);

        self.virtuals
            .iter()
            .filter(|v| v.fragment_type() == FragmentType::Usage)
            .cloned()
            .map(Fragment::Virtual)
            .chain(with_mtime.into_iter().map(|(_, f)| Fragment::Path(f.clone())))
            .collect()
    }

    /// Read-only files, then virtual fragments other than usages.
    pub fn read_only_fragments(&self) -> Vec<Fragment> {
        self.readonly
            .iter()
            .cloned()
            .map(Fragment::Path)
            .chain(
                self.virtuals
                    .iter()
                    .filter(|v| v.fragment_type() != FragmentType::Usage)
                    .cloned()
                    .map(Fragment::Virtual),
            )
            .collect()
    }

    /// History (when present), read-only, virtual, then editable.
    pub fn all_fragments_in_display_order(&self) -> Vec<Fragment> {
        let mut out = Vec::new();
        if let Some(id) = self.history_id {
            out.push(Fragment::Virtual(VirtualFragment::History(
                HistoryFragment::new(id, self.task_history.to_vec()),
            )));
        }
        out.extend(self.readonly.iter().cloned().map(Fragment::Path));
        out.extend(self.virtuals.iter().cloned().map(Fragment::Virtual));
        out.extend(self.editable.iter().cloned().map(Fragment::Path));
        out
    }

    pub fn editable_toc(&self) -> String {
        toc(self.editable_fragments())
    }

    pub fn read_only_toc(&self) -> String {
        toc(self.read_only_fragments())
    }

    /// Sequence number the next task entry will receive.
    pub fn next_sequence(&self) -> u32 {
        self.task_history
            .last()
            .map_or(1, |e| e.sequence().saturating_add(1))
    }

    // ── Fragment list operations ──

    pub fn add_editable_files(&self, files: impl IntoIterator<Item = PathFragment>) -> Context {
        let added = new_entries(&self.editable, files);
        if added.is_empty() {
            return self.clone();
        }
        let label = format!("Edit {}", short_descriptions(&added));
        let mut editable = self.editable.to_vec();
        editable.extend(added);
        self.derive(Some(editable), None, None, ActionLabel::resolved(label))
    }

    pub fn add_readonly_files(&self, files: impl IntoIterator<Item = PathFragment>) -> Context {
        let added = new_entries(&self.readonly, files);
        if added.is_empty() {
            return self.clone();
        }
        let label = format!("Read {}", short_descriptions(&added));
        let mut readonly = self.readonly.to_vec();
        readonly.extend(added);
        self.derive(None, Some(readonly), None, ActionLabel::resolved(label))
    }

    pub fn remove_editable_files(&self, files: &[PathFragment]) -> Context {
        match without(&self.editable, files) {
            Some(editable) => {
                let label = removed_label(files.iter().map(PathFragment::short_description));
                self.derive(Some(editable), None, None, label)
            }
            None => self.clone(),
        }
    }

    pub fn remove_readonly_files(&self, files: &[PathFragment]) -> Context {
        match without(&self.readonly, files) {
            Some(readonly) => {
                let label = removed_label(files.iter().map(PathFragment::short_description));
                self.derive(None, Some(readonly), None, label)
            }
            None => self.clone(),
        }
    }

    pub fn remove_virtual_fragments(&self, fragments: &[VirtualFragment]) -> Context {
        match without(&self.virtuals, fragments) {
            Some(virtuals) => {
                let label = removed_label(fragments.iter().map(VirtualFragment::short_description));
                self.derive(None, None, Some(virtuals), label)
            }
            None => self.clone(),
        }
    }

    pub fn add_virtual_fragment(&self, fragment: VirtualFragment) -> Context {
        if self.virtuals.contains(&fragment) {
            return self.clone();
        }
        let label = format!("Added {}", fragment.short_description());
        let mut virtuals = self.virtuals.to_vec();
        virtuals.push(fragment);
        self.derive(None, None, Some(virtuals), ActionLabel::resolved(label))
    }

    /// Add pasted content whose description is produced asynchronously.
    pub fn add_paste_fragment(&self, fragment: VirtualFragment, summary: &ActionLabel) -> Context {
        if self.virtuals.contains(&fragment) {
            return self.clone();
        }
        let label = summary.derive(|s| format!("Added paste of {s}"), "Added paste");
        let mut virtuals = self.virtuals.to_vec();
        virtuals.push(fragment);
        self.derive(None, None, Some(virtuals), label)
    }

    /// Drop a fragment that could not be read, from whichever list holds it.
    pub fn remove_bad_fragment(&self, fragment: &Fragment) -> Context {
        let label = ActionLabel::resolved(format!("Removed unreadable {}", fragment.description()));
        match fragment {
            Fragment::Path(p) => {
                let editable = without(&self.editable, std::slice::from_ref(p));
                let readonly = without(&self.readonly, std::slice::from_ref(p));
                if editable.is_none() && readonly.is_none() {
                    tracing::warn!(fragment = %p.description(), "unreadable fragment not found in context");
                    return self.clone();
                }
                self.derive(editable, readonly, None, label)
            }
            Fragment::Virtual(v) => match without(&self.virtuals, std::slice::from_ref(v)) {
                Some(virtuals) => self.derive(None, None, Some(virtuals), label),
                None => {
                    tracing::warn!(fragment = %v.description(), "unreadable fragment not found in context");
                    self.clone()
                }
            },
        }
    }

    /// The canonical empty snapshot: no fragments and no history.
    pub fn remove_all(&self) -> Context {
        Context {
            task_history: Arc::default(),
            history_id: None,
            ..self.derive(
                Some(Vec::new()),
                Some(Vec::new()),
                Some(Vec::new()),
                ActionLabel::resolved("Dropped all context"),
            )
        }
    }

    // ── History operations ──

    /// Build the entry a task result would append to this context's history.
    pub fn create_task_entry(&self, result: &TaskResult) -> TaskEntry {
        let log = TaskFragment::new(
            self.manager.ids().next_fragment_id(),
            result.messages.clone(),
            result.action_description.clone(),
        );
        TaskEntry::from_log(self.next_sequence(), log)
    }

    /// Append `entry` (renumbered to follow the current history) and record
    /// the pre-edit contents of files the task changed.
    pub fn add_history_entry(
        &self,
        entry: TaskEntry,
        parsed_output: Option<TaskFragment>,
        action: ActionLabel,
        original_contents: BTreeMap<ProjectFile, String>,
    ) -> Context {
        let mut history = self.task_history.to_vec();
        history.push(entry.with_sequence(self.next_sequence()));
        Context {
            id: self.manager.ids().next_context_id(),
            history_id: history_id(&self.manager, &history),
            task_history: Arc::new(history),
            original_contents: Arc::new(original_contents),
            parsed_output: parsed_output.map(Arc::new),
            action,
            ..self.clone()
        }
    }

    pub fn clear_history(&self) -> Context {
        Context {
            id: self.manager.ids().next_context_id(),
            task_history: Arc::default(),
            history_id: None,
            original_contents: Arc::default(),
            parsed_output: None,
            action: ActionLabel::resolved("Cleared task history"),
            ..self.clone()
        }
    }

    pub fn with_compressed_history(&self, history: Vec<TaskEntry>) -> Context {
        let history = normalize_sequences(history);
        Context {
            id: self.manager.ids().next_context_id(),
            history_id: history_id(&self.manager, &history),
            task_history: Arc::new(history),
            original_contents: Arc::default(),
            parsed_output: None,
            action: ActionLabel::resolved("Compressed history"),
            ..self.clone()
        }
    }

    // ── Snapshot variants ──

    pub fn with_parsed_output(&self, parsed_output: Option<TaskFragment>, action: ActionLabel) -> Context {
        Context {
            id: self.manager.ids().next_context_id(),
            parsed_output: parsed_output.map(Arc::new),
            action,
            ..self.clone()
        }
    }

    /// Same snapshot id, different pre-edit contents.
    pub fn with_original_contents(&self, contents: BTreeMap<ProjectFile, String>) -> Context {
        Context {
            original_contents: Arc::new(contents),
            ..self.clone()
        }
    }

    /// Same snapshot id, relabelled.
    pub fn with_action(&self, action: ActionLabel) -> Context {
        Context {
            action,
            ..self.clone()
        }
    }

    /// Fragments of `source` on top of `current`'s history.
    pub fn create_from(source: &Context, current: &Context) -> Context {
        Context {
            id: current.manager.ids().next_context_id(),
            manager: Arc::clone(&current.manager),
            editable: Arc::clone(&source.editable),
            readonly: Arc::clone(&source.readonly),
            virtuals: Arc::clone(&source.virtuals),
            task_history: Arc::clone(&current.task_history),
            history_id: current.history_id,
            original_contents: Arc::default(),
            parsed_output: None,
            action: ActionLabel::resolved("Reset context to historical state"),
        }
    }

    /// Fragments and history of `source`.
    pub fn create_from_including_history(source: &Context, current: &Context) -> Context {
        Context {
            id: current.manager.ids().next_context_id(),
            manager: Arc::clone(&current.manager),
            editable: Arc::clone(&source.editable),
            readonly: Arc::clone(&source.readonly),
            virtuals: Arc::clone(&source.virtuals),
            task_history: Arc::clone(&source.task_history),
            history_id: source.history_id,
            original_contents: Arc::default(),
            parsed_output: None,
            action: ActionLabel::resolved("Reset context and history to historical state"),
        }
    }

    /// Same id, replaced fragment lists. Used by freezing.
    pub(crate) fn with_lists_same_id(
        &self,
        editable: Vec<PathFragment>,
        readonly: Vec<PathFragment>,
        virtuals: Vec<VirtualFragment>,
    ) -> Context {
        Context {
            editable: Arc::new(editable),
            readonly: Arc::new(readonly),
            virtuals: Arc::new(virtuals),
            ..self.clone()
        }
    }

    /// New snapshot with some lists replaced. Fragment changes invalidate
    /// parsed output and original contents.
    fn derive(
        &self,
        editable: Option<Vec<PathFragment>>,
        readonly: Option<Vec<PathFragment>>,
        virtuals: Option<Vec<VirtualFragment>>,
        action: ActionLabel,
    ) -> Context {
        Context {
            id: self.manager.ids().next_context_id(),
            manager: Arc::clone(&self.manager),
            editable: editable.map_or_else(|| Arc::clone(&self.editable), Arc::new),
            readonly: readonly.map_or_else(|| Arc::clone(&self.readonly), Arc::new),
            virtuals: virtuals.map_or_else(|| Arc::clone(&self.virtuals), Arc::new),
            task_history: Arc::clone(&self.task_history),
            history_id: self.history_id,
            original_contents: Arc::default(),
            parsed_output: None,
            action,
        }
    }
}

fn history_id(manager: &Arc<dyn ContextManager>, history: &[TaskEntry]) -> Option<FragmentId> {
    (!history.is_empty()).then(|| manager.ids().next_fragment_id())
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("editable", &self.editable.len())
            .field("readonly", &self.readonly.len())
            .field("virtuals", &self.virtuals.len())
            .field("task_history", &self.task_history.len())
            .field("action", &self.action)
            .finish()
    }
}

// ── Helpers ──

fn new_entries<T: PartialEq>(existing: &[T], candidates: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut added: Vec<T> = Vec::new();
    for c in candidates {
        if !existing.contains(&c) && !added.contains(&c) {
            added.push(c);
        }
    }
    added
}

/// `list` minus `remove`, or `None` when nothing was removed.
fn without<T: PartialEq + Clone>(list: &[T], remove: &[T]) -> Option<Vec<T>> {
    let kept: Vec<T> = list.iter().filter(|x| !remove.contains(x)).cloned().collect();
    (kept.len() != list.len()).then_some(kept)
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    new_entries(&[], items)
}

fn short_descriptions(files: &[PathFragment]) -> String {
    files
        .iter()
        .map(PathFragment::short_description)
        .collect::<Vec<_>>()
        .join(", ")
}

fn removed_label(names: impl Iterator<Item = String>) -> ActionLabel {
    ActionLabel::resolved(format!("Removed {}", names.collect::<Vec<_>>().join(", ")))
}

fn toc(fragments: Vec<Fragment>) -> String {
    fragments
        .iter()
        .map(Fragment::format_toc)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renumber from 1 when sequences are not strictly increasing.
fn normalize_sequences(history: Vec<TaskEntry>) -> Vec<TaskEntry> {
    let increasing = history
        .windows(2)
        .all(|w| w[0].sequence() < w[1].sequence());
    if increasing {
        return history;
    }
    tracing::debug!(entries = history.len(), "renumbering task history sequences");
    history
        .into_iter()
        .zip(1u32..)
        .map(|(e, seq)| e.with_sequence(seq))
        .collect()
}
