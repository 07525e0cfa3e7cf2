use crate::fragment::FragmentType;

/// Validation failure raised when a fragment, task entry, or value type is
/// constructed with inconsistent data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FragmentError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be an absolute path, got '{path}'")]
    NotAbsolute { field: &'static str, path: String },

    #[error("{field} must be relative to the project root, got '{path}'")]
    NotRelative { field: &'static str, path: String },

    #[error("task entry must carry exactly one of log or summary")]
    TaskEntryArity,

    #[error("call graph depth must be positive, got {0}")]
    NonPositiveDepth(i64),

    #[error("unknown message role '{0}'")]
    UnknownRole(String),

    #[error("unknown code unit kind '{0}'")]
    UnknownKind(String),

    #[error("unknown summary type '{0}'")]
    UnknownSummaryType(String),

    #[error("image data is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("frozen fragment must carry exactly one of text or image data")]
    FrozenContentArity,

    #[error("fragment type '{0}' cannot appear in this position")]
    WrongFamily(FragmentType),
}

/// Failure decoding or encoding the persisted context schema.
#[derive(Debug, thiserror::Error)]
pub enum DtoError {
    #[error("malformed context json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid fragment: {0}")]
    Invalid(#[from] FragmentError),
}

/// Version-control failure reported by a [`crate::Repository`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("git operation failed: {0}")]
    Operation(String),
}

/// Returned by long-running analyzer work when the caller cancelled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;
