pub mod action;
pub mod capability;
pub mod code_unit;
pub mod context;
pub mod dto;
pub mod error;
pub mod file;
pub mod fragment;
pub mod freeze;
pub mod hash;
pub mod ids;
pub mod task;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action::{ActionLabel, ActionResolver, ActionState};
pub use capability::{
    Analyzer, CommitFiles, ContextManager, FileStatus, ModifiedFile, NullAnalyzer, OfflineManager,
    Project, Repository, WeightedSeeds,
};
pub use code_unit::{CodeUnit, CodeUnitKind};
pub use context::{Context, ContextParts};
pub use dto::ContextDto;
pub use error::{Cancelled, DtoError, FragmentError, RepoError};
pub use file::{ExternalFile, ProjectFile};
pub use fragment::{Fragment, FragmentType, FrozenFragment, PathFragment, VirtualFragment};
pub use freeze::FreezeOutcome;
pub use ids::{ContextId, FragmentId, IdGenerator};
pub use task::{ChatMessage, MessageRole, StopReason, TaskEntry, TaskResult};
