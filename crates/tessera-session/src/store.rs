//! Session files on disk.
//!
//! A session file is a versioned JSON document:
//! `{"version":1,"session_id":"ses_<ulid>","saved_at":"<rfc3339>","steps":[...]}`.
//! Writes go to a temp file in the same directory and are renamed into place
//! while holding an exclusive `<file>.lock`. Files written before the
//! timeline existed (`{"contexts":[...]}`) are migrated on load.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tessera_core::dto::ChatMessageDto;
use tessera_core::{
    ChatMessage, ContextDto, ContextId, ContextManager, DtoError, StopReason, TaskResult,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionError;
use crate::history::SessionHistory;
use crate::migrate::migrate_legacy;
use crate::step::{SessionEvent, SessionStep};

pub const FORMAT_VERSION: u32 = 1;

const SESSION_ID_PREFIX: &str = "ses_";

// ── Schema ──

#[derive(Debug, Serialize, Deserialize)]
struct SessionFileDto {
    version: u32,
    session_id: String,
    saved_at: String,
    #[serde(default)]
    steps: Vec<SessionStepDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionStepDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<SessionEventDto>,
    #[serde(default)]
    contexts: Vec<ContextDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionEventDto {
    before_context: ContextId,
    action_description: String,
    #[serde(default)]
    messages: Vec<ChatMessageDto>,
    stop_reason: StopReason,
}

#[derive(Debug, Deserialize)]
struct LegacyFileDto {
    contexts: Vec<ContextDto>,
}

/// A session read back from disk.
#[derive(Debug)]
pub struct LoadedSession {
    pub session_id: String,
    /// Absent for migrated legacy files.
    pub saved_at: Option<OffsetDateTime>,
    pub history: SessionHistory,
    pub migrated: bool,
}

/// Fresh session id: `ses_` followed by a lowercase ULID.
pub fn new_session_id() -> String {
    format!(
        "{SESSION_ID_PREFIX}{}",
        ulid::Ulid::new().to_string().to_lowercase()
    )
}

// ── Save ──

pub fn save_history(
    path: &Path,
    session_id: &str,
    history: &SessionHistory,
) -> Result<(), SessionError> {
    let saved_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| SessionError::Encode(e.to_string()))?;
    let doc = SessionFileDto {
        version: FORMAT_VERSION,
        session_id: session_id.to_string(),
        saved_at,
        steps: history.steps().iter().map(step_to_dto).collect(),
    };
    let json =
        serde_json::to_vec_pretty(&doc).map_err(|e| SessionError::Encode(e.to_string()))?;

    let lock = lock_path(path);
    let _guard = lock_file(&lock).map_err(|source| SessionError::Io { path: lock, source })?;
    write_atomic(path, &json).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), steps = history.len(), "session saved");
    Ok(())
}

fn step_to_dto(step: &SessionStep) -> SessionStepDto {
    SessionStepDto {
        event: step.event().map(|e| SessionEventDto {
            before_context: e.before_context,
            action_description: e.result.action_description.clone(),
            messages: e.result.messages.iter().map(Into::into).collect(),
            stop_reason: e.result.stop_reason,
        }),
        contexts: step.contexts().iter().map(|c| c.to_dto()).collect(),
    }
}

// ── Load ──

pub fn load_history(
    path: &Path,
    manager: Arc<dyn ContextManager>,
) -> Result<LoadedSession, SessionError> {
    let raw = fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| malformed(path, e))?;

    if value.get("steps").is_some() {
        let version = value.get("version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(FORMAT_VERSION)) {
            return Err(SessionError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: version.and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
            });
        }
        let doc: SessionFileDto = serde_json::from_value(value).map_err(|e| malformed(path, e))?;
        return decode_current(path, doc, manager);
    }
    if value.get("contexts").is_some() {
        let doc: LegacyFileDto = serde_json::from_value(value).map_err(|e| malformed(path, e))?;
        let contexts = doc
            .contexts
            .into_iter()
            .map(|c| c.into_context(Arc::clone(&manager)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| context_error(path, source))?;
        tracing::info!(path = %path.display(), contexts = contexts.len(), "loading legacy session file");
        return Ok(LoadedSession {
            session_id: new_session_id(),
            saved_at: None,
            history: migrate_legacy(contexts)?,
            migrated: true,
        });
    }
    Err(malformed(path, "expected a \"steps\" or \"contexts\" field"))
}

fn decode_current(
    path: &Path,
    doc: SessionFileDto,
    manager: Arc<dyn ContextManager>,
) -> Result<LoadedSession, SessionError> {
    if !doc.session_id.starts_with(SESSION_ID_PREFIX) {
        return Err(malformed(
            path,
            format!("session id {:?} lacks the {SESSION_ID_PREFIX} prefix", doc.session_id),
        ));
    }
    let saved_at = OffsetDateTime::parse(&doc.saved_at, &Rfc3339).map_err(|e| malformed(path, e))?;

    let mut history = SessionHistory::default();
    for step in doc.steps {
        let contexts = step
            .contexts
            .into_iter()
            .map(|c| c.into_context(Arc::clone(&manager)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| context_error(path, source))?;
        let event = step
            .event
            .map(|e| decode_event(e).map_err(|source| context_error(path, source)))
            .transpose()?;
        history.push(SessionStep::new(event, contexts)?);
    }
    Ok(LoadedSession {
        session_id: doc.session_id,
        saved_at: Some(saved_at),
        history,
        migrated: false,
    })
}

fn decode_event(dto: SessionEventDto) -> Result<SessionEvent, DtoError> {
    let messages = dto
        .messages
        .into_iter()
        .map(ChatMessage::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let result =
        TaskResult::new(dto.action_description, messages).with_stop_reason(dto.stop_reason);
    Ok(SessionEvent::new(dto.before_context, result))
}

fn malformed(path: &Path, detail: impl ToString) -> SessionError {
    SessionError::Malformed {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn context_error(path: &Path, source: DtoError) -> SessionError {
    SessionError::Context {
        path: path.to_path_buf(),
        source,
    }
}

// ── Files ──

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Held for as long as the exclusive lock is needed.
struct LockGuard {
    _file: fs::File,
}

fn lock_file(path: &Path) -> io::Result<LockGuard> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(LockGuard { _file: file })
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
