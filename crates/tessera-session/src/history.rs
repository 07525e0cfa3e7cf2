use tessera_core::{Context, ContextId};

use crate::step::SessionStep;

/// Session steps, oldest first.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    steps: Vec<SessionStep>,
}

impl SessionHistory {
    pub fn new(steps: Vec<SessionStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[SessionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push(&mut self, step: SessionStep) {
        self.steps.push(step);
    }

    /// Every context in timeline order: step order, then order within a step.
    pub fn flatten_contexts(&self) -> Vec<Context> {
        self.steps
            .iter()
            .flat_map(|s| s.contexts().iter().cloned())
            .collect()
    }

    /// First step holding a context with this id.
    pub fn step_for_context(&self, id: ContextId) -> Option<&SessionStep> {
        self.steps.iter().find(|s| s.contains(id))
    }

    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.steps
            .iter()
            .flat_map(SessionStep::contexts)
            .find(|c| c.id() == id)
    }

    /// Newest context in the timeline.
    pub fn latest_context(&self) -> Option<&Context> {
        self.steps.iter().rev().find_map(|s| s.contexts().last())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_core::{ContextManager, OfflineManager, TaskResult};

    use super::*;
    use crate::step::SessionEvent;

    #[test]
    fn flatten_preserves_step_then_list_order() {
        let m: Arc<dyn ContextManager> = Arc::new(OfflineManager::new("/repo"));
        let c1 = Context::new(m.clone());
        let c2 = Context::new(m.clone());
        let c3 = Context::new(m);
        let s1 = SessionStep::manual(c1.clone()).unwrap();
        let event = SessionEvent::new(c1.id(), TaskResult::new("Code", vec![]));
        let s2 = SessionStep::new(Some(event), vec![c2.clone(), c3.clone()]).unwrap();
        let history = SessionHistory::new(vec![s1, s2]);

        let ids: Vec<ContextId> = history.flatten_contexts().iter().map(Context::id).collect();
        assert_eq!(ids, vec![c1.id(), c2.id(), c3.id()]);

        assert!(history.step_for_context(c1.id()).unwrap().is_manual());
        assert_eq!(history.step_for_context(c3.id()).unwrap().contexts().len(), 2);
        assert!(history.step_for_context(ContextId(999)).is_none());
        assert_eq!(history.latest_context().map(Context::id), Some(c3.id()));
    }

    #[test]
    fn step_lookup_returns_first_match() {
        let m: Arc<dyn ContextManager> = Arc::new(OfflineManager::new("/repo"));
        let shared = Context::new(m);
        let first = SessionStep::manual(shared.clone()).unwrap();
        let event = SessionEvent::new(shared.id(), TaskResult::new("Replay", vec![]));
        let second = SessionStep::new(Some(event), vec![shared.clone()]).unwrap();
        let history = SessionHistory::new(vec![first, second]);

        assert!(history.step_for_context(shared.id()).unwrap().is_manual());
    }

    #[test]
    fn empty_history_has_nothing() {
        let history = SessionHistory::default();
        assert!(history.is_empty());
        assert!(history.flatten_contexts().is_empty());
        assert!(history.latest_context().is_none());
    }
}
