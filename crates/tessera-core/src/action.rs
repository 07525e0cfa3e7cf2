use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Shown while a label is still being produced.
pub const SUMMARIZING: &str = "(Summarizing)";
/// Shown when label production failed.
pub const ACTION_ERROR: &str = "(Error retrieving action)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    Pending,
    Resolved(String),
    Failed(String),
}

/// Human-readable description of the change that produced a snapshot.
///
/// Labels may be produced later (e.g. by a summarizer); reads never block.
#[derive(Clone)]
pub struct ActionLabel {
    inner: Arc<Inner>,
}

type Mapper = Box<dyn Fn(&str) -> String + Send + Sync>;

enum Inner {
    Ready(ActionState),
    Channel(Mutex<Slot>),
    Derived {
        source: ActionLabel,
        on_resolved: Mapper,
        fallback: String,
    },
}

struct Slot {
    rx: Option<oneshot::Receiver<Result<String, String>>>,
    state: ActionState,
}

impl Slot {
    fn poll(&mut self) -> ActionState {
        if let Some(rx) = self.rx.as_mut() {
            match rx.try_recv() {
                Ok(Ok(label)) => {
                    self.state = ActionState::Resolved(label);
                    self.rx = None;
                }
                Ok(Err(reason)) => self.fail(reason),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => self.fail("label producer dropped".to_string()),
            }
        }
        self.state.clone()
    }

    // runs once per label: the receiver is gone afterwards
    fn fail(&mut self, reason: String) {
        tracing::warn!(reason = %reason, "action label could not be produced");
        self.state = ActionState::Failed(reason);
        self.rx = None;
    }
}

/// Producer half of a pending [`ActionLabel`].
pub struct ActionResolver {
    tx: oneshot::Sender<Result<String, String>>,
}

impl ActionResolver {
    pub fn resolve(self, label: impl Into<String>) {
        // receiver gone means every snapshot holding the label was dropped
        let _ = self.tx.send(Ok(label.into()));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

impl ActionLabel {
    pub fn resolved(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner::Ready(ActionState::Resolved(label.into()))),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner::Ready(ActionState::Failed(reason.into()))),
        }
    }

    pub fn pending() -> (Self, ActionResolver) {
        let (tx, rx) = oneshot::channel();
        let label = Self {
            inner: Arc::new(Inner::Channel(Mutex::new(Slot {
                rx: Some(rx),
                state: ActionState::Pending,
            }))),
        };
        (label, ActionResolver { tx })
    }

    /// A label that tracks `self`, rewriting its resolved text and replacing
    /// a failure with `fallback`.
    pub fn derive(
        &self,
        on_resolved: impl Fn(&str) -> String + Send + Sync + 'static,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner::Derived {
                source: self.clone(),
                on_resolved: Box::new(on_resolved),
                fallback: fallback.into(),
            }),
        }
    }

    pub fn state(&self) -> ActionState {
        match &*self.inner {
            Inner::Ready(state) => state.clone(),
            Inner::Channel(slot) => slot.lock().unwrap_or_else(PoisonError::into_inner).poll(),
            Inner::Derived {
                source,
                on_resolved,
                fallback,
            } => match source.state() {
                ActionState::Pending => ActionState::Pending,
                ActionState::Resolved(label) => ActionState::Resolved(on_resolved(&label)),
                ActionState::Failed(_) => ActionState::Resolved(fallback.clone()),
            },
        }
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.state(), ActionState::Pending)
    }

    /// Current display text; never blocks.
    pub fn text(&self) -> String {
        match self.state() {
            ActionState::Resolved(label) => label,
            ActionState::Pending => SUMMARIZING.to_string(),
            ActionState::Failed(reason) => {
                tracing::debug!(reason = %reason, "reading failed action label");
                ACTION_ERROR.to_string()
            }
        }
    }
}

impl fmt::Debug for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionLabel").field(&self.state()).finish()
    }
}

impl From<&str> for ActionLabel {
    fn from(label: &str) -> Self {
        Self::resolved(label)
    }
}

impl From<String> for ActionLabel {
    fn from(label: String) -> Self {
        Self::resolved(label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::Level;
    use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    #[derive(Clone, Default)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn resolved_label_reads_back() {
        assert_eq!(ActionLabel::resolved("Edit a.rs").text(), "Edit a.rs");
    }

    #[test]
    fn pending_then_resolved() {
        let (label, resolver) = ActionLabel::pending();
        assert_eq!(label.text(), SUMMARIZING);
        assert!(!label.is_done());
        resolver.resolve("Summarized");
        assert_eq!(label.text(), "Summarized");
        // cached after the first successful poll
        assert_eq!(label.clone().text(), "Summarized");
    }

    #[test]
    fn failed_or_dropped_producer_reads_as_error() {
        let (label, resolver) = ActionLabel::pending();
        resolver.fail("boom");
        assert_eq!(label.text(), ACTION_ERROR);

        let (dropped, resolver) = ActionLabel::pending();
        drop(resolver);
        assert_eq!(dropped.text(), ACTION_ERROR);
    }

    #[test]
    fn failure_is_warned_once_however_often_it_is_read() {
        let counter = WarnCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        tracing::subscriber::with_default(subscriber, || {
            let (label, resolver) = ActionLabel::pending();
            let derived = label.derive(|s| s.to_string(), "fallback");
            resolver.fail("boom");
            for _ in 0..10 {
                assert_eq!(label.text(), ACTION_ERROR);
                assert_eq!(derived.text(), "fallback");
            }
        });
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn derived_label_maps_and_falls_back() {
        let (summary, resolver) = ActionLabel::pending();
        let label = summary.derive(|s| format!("Added paste of {s}"), "Added paste");
        assert_eq!(label.text(), SUMMARIZING);
        resolver.resolve("json config");
        assert_eq!(label.text(), "Added paste of json config");

        let (summary, resolver) = ActionLabel::pending();
        let label = summary.derive(|s| format!("Added paste of {s}"), "Added paste");
        resolver.fail("model unavailable");
        assert_eq!(label.text(), "Added paste");
    }
}
