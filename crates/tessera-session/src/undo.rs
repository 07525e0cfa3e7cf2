//! Bounded undo/redo stack of context snapshots.

use std::collections::VecDeque;
use std::mem;

use tessera_core::{Context, ContextId};

use crate::history::SessionHistory;

/// Oldest snapshots are discarded beyond this depth.
pub const MAX_UNDO_DEPTH: usize = 100;

/// Linear undo history whose newest entry is the live context.
///
/// The stack is never empty. Pushing clears the redo side.
#[derive(Debug, Clone)]
pub struct UndoStack {
    past: VecDeque<Context>,
    top: Context,
    redo: Vec<Context>,
    selected: Option<ContextId>,
}

impl UndoStack {
    pub fn new(live: Context) -> Self {
        Self {
            past: VecDeque::new(),
            top: live,
            redo: Vec::new(),
            selected: None,
        }
    }

    /// Stack over a session timeline, newest context on top. `None` when the
    /// timeline holds no contexts.
    pub fn from_history(history: &SessionHistory) -> Option<Self> {
        let mut contexts: VecDeque<Context> = history.flatten_contexts().into();
        let top = contexts.pop_back()?;
        let mut stack = Self {
            past: contexts,
            top,
            redo: Vec::new(),
            selected: None,
        };
        stack.truncate();
        Some(stack)
    }

    pub fn top(&self) -> &Context {
        &self.top
    }

    /// Every snapshot, oldest first.
    pub fn contexts(&self) -> impl Iterator<Item = &Context> + '_ {
        self.past.iter().chain(std::iter::once(&self.top))
    }

    pub fn len(&self) -> usize {
        self.past.len() + 1
    }

    pub fn has_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn has_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// The selected snapshot, falling back to the top when the selection is
    /// no longer on the stack.
    pub fn selected(&self) -> &Context {
        self.selected
            .and_then(|id| self.find(id))
            .unwrap_or(&self.top)
    }

    /// Select a snapshot by id. Returns false if it is not on the stack.
    pub fn select(&mut self, id: ContextId) -> bool {
        if self.find(id).is_some() {
            self.selected = Some(id);
            return true;
        }
        tracing::warn!(context = %id, depth = self.len(), "cannot select context not in history");
        false
    }

    /// Apply `generator` to the top. Nothing is recorded when it hands back
    /// the same snapshot.
    pub fn push(&mut self, generator: impl FnOnce(&Context) -> Context) -> &Context {
        let next = generator(&self.top);
        if !next.is_same_snapshot(&self.top) {
            self.push_live(next);
        }
        &self.top
    }

    /// Make `ctx` the new top and select it.
    pub fn push_live(&mut self, ctx: Context) {
        let previous = mem::replace(&mut self.top, ctx);
        self.past.push_back(previous);
        self.truncate();
        self.redo.clear();
        self.selected = None;
    }

    /// Swap the top for `ctx` without growing the stack.
    pub fn replace_top(&mut self, ctx: Context) {
        self.top = ctx;
        self.redo.clear();
        self.selected = None;
    }

    /// Undo up to `steps` snapshots. Returns how many were undone.
    pub fn undo(&mut self, steps: usize) -> usize {
        let mut undone = 0;
        while undone < steps {
            let Some(previous) = self.past.pop_back() else {
                break;
            };
            let popped = mem::replace(&mut self.top, previous);
            self.redo.push(popped);
            undone += 1;
        }
        if undone > 0 {
            self.selected = None;
        }
        undone
    }

    /// Undo until the snapshot with `id` is on top.
    pub fn undo_until(&mut self, id: ContextId) -> usize {
        match self.past.iter().position(|c| c.id() == id) {
            Some(index) => self.undo(self.past.len() - index),
            None => 0,
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let previous = mem::replace(&mut self.top, next);
        self.past.push_back(previous);
        self.truncate();
        self.selected = None;
        true
    }

    /// The snapshot just before the one with `id`, if any.
    pub fn previous_of(&self, id: ContextId) -> Option<&Context> {
        let mut previous = None;
        for ctx in self.contexts() {
            if ctx.id() == id {
                return previous;
            }
            previous = Some(ctx);
        }
        None
    }

    fn find(&self, id: ContextId) -> Option<&Context> {
        self.contexts().find(|c| c.id() == id)
    }

    fn truncate(&mut self) {
        while self.len() > MAX_UNDO_DEPTH {
            if let Some(dropped) = self.past.pop_front() {
                tracing::debug!(context = %dropped.id(), "undo history truncated");
            }
        }
    }
}
