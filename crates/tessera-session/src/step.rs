use tessera_core::{Context, ContextId, TaskResult};

use crate::error::SessionError;

/// The task that produced an AI-driven step.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// Context the task started from. It lives in an earlier step.
    pub before_context: ContextId,
    pub result: TaskResult,
}

impl SessionEvent {
    pub fn new(before_context: ContextId, result: TaskResult) -> Self {
        Self {
            before_context,
            result,
        }
    }
}

/// One chronological step of a session.
///
/// A manual step (no event) holds exactly one context. An AI step may hold
/// none (a read-only turn) or several, in production order. Every context
/// must be frozen.
#[derive(Debug, Clone)]
pub struct SessionStep {
    event: Option<SessionEvent>,
    contexts: Vec<Context>,
}

impl SessionStep {
    pub fn new(event: Option<SessionEvent>, contexts: Vec<Context>) -> Result<Self, SessionError> {
        if event.is_none() && contexts.len() != 1 {
            return Err(SessionError::ManualStepArity(contexts.len()));
        }
        if let Some(live) = contexts.iter().find(|c| !c.is_frozen()) {
            return Err(SessionError::NotFrozen(live.id()));
        }
        Ok(Self { event, contexts })
    }

    pub fn manual(context: Context) -> Result<Self, SessionError> {
        Self::new(None, vec![context])
    }

    pub fn event(&self) -> Option<&SessionEvent> {
        self.event.as_ref()
    }

    pub fn is_manual(&self) -> bool {
        self.event.is_none()
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.contexts.iter().any(|c| c.id() == id)
    }

    /// Label shown for the step: the task description for AI steps, the
    /// context's action otherwise.
    pub fn description(&self) -> String {
        match (&self.event, self.contexts.first()) {
            (Some(event), _) => event.result.action_description.clone(),
            (None, Some(ctx)) => ctx.action(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_core::{ContextManager, OfflineManager, PathFragment, ProjectFile};

    use super::*;

    fn manager() -> Arc<dyn ContextManager> {
        Arc::new(OfflineManager::new("/repo"))
    }

    fn live_context(manager: &Arc<dyn ContextManager>) -> Context {
        let file = ProjectFile::new("/repo", "src/A.java").unwrap();
        let fragment = PathFragment::project_file(manager.ids().next_fragment_id(), file);
        Context::new(Arc::clone(manager)).add_editable_files([fragment])
    }

    #[test]
    fn manual_step_needs_exactly_one_context() {
        let m = manager();
        assert!(matches!(
            SessionStep::new(None, vec![]),
            Err(SessionError::ManualStepArity(0))
        ));
        let two = vec![Context::new(m.clone()), Context::new(m.clone())];
        assert!(matches!(
            SessionStep::new(None, two),
            Err(SessionError::ManualStepArity(2))
        ));
        assert!(SessionStep::manual(Context::new(m)).unwrap().is_manual());
    }

    #[test]
    fn ai_step_may_be_empty_or_hold_several() {
        let m = manager();
        let before = Context::new(m.clone());
        let event = || SessionEvent::new(before.id(), TaskResult::new("Ask", vec![]));

        let empty = SessionStep::new(Some(event()), vec![]).unwrap();
        assert!(empty.contexts().is_empty());
        assert_eq!(empty.description(), "Ask");

        let many = SessionStep::new(
            Some(event()),
            vec![Context::new(m.clone()), Context::new(m)],
        )
        .unwrap();
        assert_eq!(many.contexts().len(), 2);
    }

    #[test]
    fn live_contexts_are_rejected() {
        let m = manager();
        let live = live_context(&m);
        let id = live.id();
        match SessionStep::manual(live) {
            Err(SessionError::NotFrozen(bad)) => assert_eq!(bad, id),
            other => panic!("expected NotFrozen, got {other:?}"),
        }

        let event = SessionEvent::new(ContextId(1), TaskResult::new("Code", vec![]));
        let err = SessionStep::new(Some(event), vec![Context::new(m.clone()), live_context(&m)])
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFrozen(_)));
    }
}
