//! The session timeline: frozen context snapshots grouped into steps, the
//! undo/redo stack built over them, and their on-disk form.

pub mod error;
pub mod history;
pub mod migrate;
pub mod step;
pub mod store;
pub mod undo;

pub use error::SessionError;
pub use history::SessionHistory;
pub use migrate::migrate_legacy;
pub use step::{SessionEvent, SessionStep};
pub use store::{load_history, new_session_id, save_history, LoadedSession, FORMAT_VERSION};
pub use undo::{UndoStack, MAX_UNDO_DEPTH};
