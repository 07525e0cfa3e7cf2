use std::path::PathBuf;

use tessera_core::{ContextId, DtoError};

/// Errors raised while building or persisting a session timeline.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A step without an event must hold exactly one context.
    #[error("manual step must hold exactly one context, got {0}")]
    ManualStepArity(usize),

    #[error("context {0} has dynamic fragments and cannot be part of a session step")]
    NotFrozen(ContextId),

    /// Freezing with cleanup still left dynamic fragments behind.
    #[error("context {0} still has dynamic fragments after cleanup")]
    CleanupFailed(ContextId),

    #[error("cannot access session file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session file {} is malformed: {detail}", path.display())]
    Malformed { path: PathBuf, detail: String },

    #[error("session file {} has unsupported version {version}", path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("invalid context in session file {}: {source}", path.display())]
    Context {
        path: PathBuf,
        #[source]
        source: DtoError,
    },

    #[error("cannot encode session: {0}")]
    Encode(String),
}
