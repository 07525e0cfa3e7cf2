//! Persisted JSON schema for contexts and fragments.
//!
//! Every decode re-runs the domain constructors, so a document that
//! violates a fragment invariant fails with [`DtoError::Invalid`].
//! Parsed output and original contents are not persisted and load empty.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::ActionLabel;
use crate::capability::ContextManager;
use crate::code_unit::{CodeUnit, CodeUnitKind};
use crate::context::{Context, ContextParts};
use crate::error::{DtoError, FragmentError};
use crate::file::{ExternalFile, ProjectFile};
use crate::fragment::{
    CallGraphFragment, FragmentType, FrozenContent, FrozenFragment, FrozenParts, HistoryFragment,
    PasteImageFragment, PasteTextFragment, PathFragment, SearchFragment, SkeletonFragment,
    StacktraceFragment, StringFragment, SummaryType, TaskFragment, UsageFragment, VirtualFragment,
};
use crate::ids::{ContextId, FragmentId};
use crate::task::{ChatMessage, MessageRole, TaskEntry};

// ── Schema ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDto {
    pub id: ContextId,
    #[serde(default)]
    pub editable: Vec<PathFragmentDto>,
    #[serde(default)]
    pub readonly: Vec<PathFragmentDto>,
    #[serde(default)]
    pub virtuals: Vec<VirtualFragmentDto>,
    #[serde(default)]
    pub task_history: Vec<TaskEntryDto>,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathFragmentDto {
    ProjectFile {
        id: FragmentId,
        repo_root: String,
        rel_path: String,
    },
    ExternalFile {
        id: FragmentId,
        abs_path: String,
    },
    ImageFile {
        id: FragmentId,
        abs_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    GitFile {
        id: FragmentId,
        repo_root: String,
        rel_path: String,
        revision: String,
        content: String,
    },
    Frozen(FrozenFragmentDto),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VirtualFragmentDto {
    Task(TaskFragmentDto),
    String {
        id: FragmentId,
        text: String,
        description: String,
        syntax_style: String,
    },
    Search {
        id: FragmentId,
        query: String,
        explanation: String,
        #[serde(default)]
        sources: Vec<CodeUnitDto>,
        #[serde(default)]
        messages: Vec<ChatMessageDto>,
    },
    Skeleton {
        id: FragmentId,
        target_identifiers: Vec<String>,
        summary_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skeletons: Option<Vec<SkeletonEntryDto>>,
    },
    Usage {
        id: FragmentId,
        target_identifier: String,
    },
    PasteText {
        id: FragmentId,
        text: String,
        description: String,
    },
    PasteImage {
        id: FragmentId,
        base64_image_data: String,
        description: String,
    },
    Stacktrace {
        id: FragmentId,
        #[serde(default)]
        sources: Vec<CodeUnitDto>,
        original: String,
        exception: String,
        code: String,
    },
    CallGraph {
        id: FragmentId,
        method_name: String,
        depth: i64,
        is_callee_graph: bool,
    },
    History {
        id: FragmentId,
        history: Vec<TaskEntryDto>,
    },
    Frozen(FrozenFragmentDto),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFragmentDto {
    pub id: FragmentId,
    #[serde(default)]
    pub messages: Vec<ChatMessageDto>,
    pub session_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntryDto {
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<TaskFragmentDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFileDto {
    pub repo_root: String,
    pub rel_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnitDto {
    pub source_file: ProjectFileDto,
    pub kind: String,
    pub package_name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonEntryDto {
    pub code_unit: CodeUnitDto,
    pub skeleton: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenFragmentDto {
    pub id: FragmentId,
    pub original_type: FragmentType,
    pub description: String,
    pub short_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub syntax_style: String,
    #[serde(default)]
    pub files: Vec<ProjectFileDto>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime_millis: Option<u64>,
}

// ── Encode ──

impl From<&ProjectFile> for ProjectFileDto {
    fn from(f: &ProjectFile) -> Self {
        Self {
            repo_root: f.root().display().to_string(),
            rel_path: f.display_path(),
        }
    }
}

impl From<&CodeUnit> for CodeUnitDto {
    fn from(cu: &CodeUnit) -> Self {
        Self {
            source_file: cu.source().into(),
            kind: cu.kind().as_str().to_string(),
            package_name: cu.package_name().to_string(),
            short_name: cu.short_name().to_string(),
        }
    }
}

impl From<&ChatMessage> for ChatMessageDto {
    fn from(m: &ChatMessage) -> Self {
        Self {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }
    }
}

impl From<&TaskFragment> for TaskFragmentDto {
    fn from(t: &TaskFragment) -> Self {
        Self {
            id: t.id(),
            messages: t.messages().iter().map(Into::into).collect(),
            session_name: t.session_name().to_string(),
        }
    }
}

impl From<&TaskEntry> for TaskEntryDto {
    fn from(e: &TaskEntry) -> Self {
        Self {
            sequence: e.sequence(),
            log: e.log().map(Into::into),
            summary: e.summary().map(str::to_string),
        }
    }
}

impl From<&FrozenFragment> for FrozenFragmentDto {
    fn from(f: &FrozenFragment) -> Self {
        let (text, image_base64) = match f.content() {
            FrozenContent::Text(t) => (Some(t.clone()), None),
            FrozenContent::Image { base64 } => (None, Some(base64.clone())),
        };
        Self {
            id: f.id(),
            original_type: f.original_type(),
            description: f.description().to_string(),
            short_description: f.short_description().to_string(),
            text,
            image_base64,
            syntax_style: f.syntax_style().to_string(),
            files: f.files().iter().map(Into::into).collect(),
            meta: f.meta().clone(),
            content_hash: f.content_hash().to_string(),
            mtime_millis: f.mtime_millis(),
        }
    }
}

impl From<&PathFragment> for PathFragmentDto {
    fn from(p: &PathFragment) -> Self {
        match p {
            PathFragment::ProjectFile(f) => Self::ProjectFile {
                id: f.id,
                repo_root: f.file.root().display().to_string(),
                rel_path: f.file.display_path(),
            },
            PathFragment::ExternalFile(f) => Self::ExternalFile {
                id: f.id,
                abs_path: f.file.abs_path().display().to_string(),
            },
            PathFragment::ImageFile(f) => Self::ImageFile {
                id: f.id,
                abs_path: f.path().display().to_string(),
                media_type: f.media_type().map(str::to_string),
            },
            PathFragment::GitFile(f) => Self::GitFile {
                id: f.id,
                repo_root: f.file.root().display().to_string(),
                rel_path: f.file.display_path(),
                revision: f.revision().to_string(),
                content: f.content().to_string(),
            },
            PathFragment::Frozen(f) => Self::Frozen(f.into()),
        }
    }
}

impl From<&VirtualFragment> for VirtualFragmentDto {
    fn from(v: &VirtualFragment) -> Self {
        match v {
            VirtualFragment::Task(t) => Self::Task(t.into()),
            VirtualFragment::String(f) => Self::String {
                id: f.id,
                text: f.text.clone(),
                description: f.description.clone(),
                syntax_style: f.syntax_style.clone(),
            },
            VirtualFragment::Search(f) => Self::Search {
                id: f.id,
                query: f.query.clone(),
                explanation: f.explanation.clone(),
                sources: f.sources.iter().map(Into::into).collect(),
                messages: f.messages.iter().map(Into::into).collect(),
            },
            VirtualFragment::Skeleton(f) => Self::Skeleton {
                id: f.id,
                target_identifiers: f.targets.clone(),
                summary_type: f.summary_type.as_str().to_string(),
                skeletons: f.skeletons.as_ref().map(|s| {
                    s.iter()
                        .map(|(cu, text)| SkeletonEntryDto {
                            code_unit: cu.into(),
                            skeleton: text.clone(),
                        })
                        .collect()
                }),
            },
            VirtualFragment::Usage(f) => Self::Usage {
                id: f.id,
                target_identifier: f.target.clone(),
            },
            VirtualFragment::PasteText(f) => Self::PasteText {
                id: f.id,
                text: f.text.clone(),
                description: f.description.clone(),
            },
            VirtualFragment::PasteImage(f) => Self::PasteImage {
                id: f.id,
                base64_image_data: f.base64_data.clone(),
                description: f.description.clone(),
            },
            VirtualFragment::Stacktrace(f) => Self::Stacktrace {
                id: f.id,
                sources: f.sources.iter().map(Into::into).collect(),
                original: f.original.clone(),
                exception: f.exception.clone(),
                code: f.code.clone(),
            },
            VirtualFragment::CallGraph(f) => Self::CallGraph {
                id: f.id,
                method_name: f.method_name.clone(),
                depth: i64::from(f.depth),
                is_callee_graph: f.callees,
            },
            VirtualFragment::History(f) => Self::History {
                id: f.id,
                history: f.entries.iter().map(Into::into).collect(),
            },
            VirtualFragment::Frozen(f) => Self::Frozen(f.into()),
        }
    }
}

impl From<&Context> for ContextDto {
    fn from(ctx: &Context) -> Self {
        Self {
            id: ctx.id(),
            editable: ctx.editable_files().iter().map(Into::into).collect(),
            readonly: ctx.readonly_files().iter().map(Into::into).collect(),
            virtuals: ctx.virtual_fragments().iter().map(Into::into).collect(),
            task_history: ctx.task_history().iter().map(Into::into).collect(),
            action: ctx.action(),
        }
    }
}

// ── Decode ──

fn non_empty(field: &'static str, value: &str) -> Result<(), FragmentError> {
    if value.is_empty() {
        return Err(FragmentError::EmptyField { field });
    }
    Ok(())
}

impl TryFrom<ProjectFileDto> for ProjectFile {
    type Error = FragmentError;

    fn try_from(dto: ProjectFileDto) -> Result<Self, Self::Error> {
        ProjectFile::new(dto.repo_root, dto.rel_path)
    }
}

impl TryFrom<CodeUnitDto> for CodeUnit {
    type Error = FragmentError;

    fn try_from(dto: CodeUnitDto) -> Result<Self, Self::Error> {
        non_empty("kind", &dto.kind)?;
        let kind = CodeUnitKind::parse(&dto.kind)?;
        CodeUnit::new(dto.source_file.try_into()?, kind, dto.package_name, dto.short_name)
    }
}

impl TryFrom<ChatMessageDto> for ChatMessage {
    type Error = FragmentError;

    fn try_from(dto: ChatMessageDto) -> Result<Self, Self::Error> {
        Ok(ChatMessage::new(MessageRole::parse(&dto.role)?, dto.content))
    }
}

impl TryFrom<TaskFragmentDto> for TaskFragment {
    type Error = FragmentError;

    fn try_from(dto: TaskFragmentDto) -> Result<Self, Self::Error> {
        let messages = collect(dto.messages)?;
        Ok(TaskFragment::new(dto.id, messages, dto.session_name))
    }
}

impl TryFrom<TaskEntryDto> for TaskEntry {
    type Error = FragmentError;

    fn try_from(dto: TaskEntryDto) -> Result<Self, Self::Error> {
        let log = dto.log.map(TaskFragment::try_from).transpose()?;
        TaskEntry::new(dto.sequence, log, dto.summary)
    }
}

impl TryFrom<FrozenFragmentDto> for FrozenFragment {
    type Error = FragmentError;

    fn try_from(dto: FrozenFragmentDto) -> Result<Self, Self::Error> {
        let content = match (dto.text, dto.image_base64) {
            (Some(text), None) => FrozenContent::Text(text),
            (None, Some(base64)) => FrozenContent::Image { base64 },
            _ => return Err(FragmentError::FrozenContentArity),
        };
        let files = dto
            .files
            .into_iter()
            .map(ProjectFile::try_from)
            .collect::<Result<BTreeSet<_>, _>>()?;
        let frozen = FrozenFragment::new(
            dto.id,
            FrozenParts {
                original_type: dto.original_type,
                description: dto.description,
                short_description: dto.short_description,
                content,
                syntax_style: dto.syntax_style,
                files,
                meta: dto.meta,
                mtime_millis: dto.mtime_millis,
            },
        )?;
        if !dto.content_hash.is_empty() && dto.content_hash != frozen.content_hash() {
            tracing::warn!(
                fragment = %frozen.id(),
                stored = %dto.content_hash,
                "frozen fragment content hash mismatch; using recomputed hash"
            );
        }
        Ok(frozen)
    }
}

impl TryFrom<PathFragmentDto> for PathFragment {
    type Error = FragmentError;

    fn try_from(dto: PathFragmentDto) -> Result<Self, Self::Error> {
        Ok(match dto {
            PathFragmentDto::ProjectFile {
                id,
                repo_root,
                rel_path,
            } => PathFragment::project_file(id, ProjectFile::new(repo_root, rel_path)?),
            PathFragmentDto::ExternalFile { id, abs_path } => {
                PathFragment::external_file(id, ExternalFile::new(abs_path)?)
            }
            PathFragmentDto::ImageFile {
                id,
                abs_path,
                media_type,
            } => PathFragment::image_file(id, abs_path, media_type)?,
            PathFragmentDto::GitFile {
                id,
                repo_root,
                rel_path,
                revision,
                content,
            } => PathFragment::git_file(id, ProjectFile::new(repo_root, rel_path)?, revision, content)?,
            PathFragmentDto::Frozen(f) => {
                if !f.original_type.is_path() {
                    return Err(FragmentError::WrongFamily(f.original_type));
                }
                PathFragment::Frozen(f.try_into()?)
            }
        })
    }
}

impl TryFrom<VirtualFragmentDto> for VirtualFragment {
    type Error = FragmentError;

    fn try_from(dto: VirtualFragmentDto) -> Result<Self, Self::Error> {
        Ok(match dto {
            VirtualFragmentDto::Task(t) => VirtualFragment::Task(t.try_into()?),
            VirtualFragmentDto::String {
                id,
                text,
                description,
                syntax_style,
            } => VirtualFragment::String(StringFragment::new(id, text, description, syntax_style)),
            VirtualFragmentDto::Search {
                id,
                query,
                explanation,
                sources,
                messages,
            } => VirtualFragment::Search(SearchFragment::new(
                id,
                query,
                explanation,
                collect_set(sources)?,
                collect(messages)?,
            )),
            VirtualFragmentDto::Skeleton {
                id,
                target_identifiers,
                summary_type,
                skeletons,
            } => {
                let summary_type = SummaryType::parse(&summary_type)?;
                let mut fragment = SkeletonFragment::new(id, target_identifiers, summary_type)?;
                if let Some(entries) = skeletons {
                    let rendered = entries
                        .into_iter()
                        .map(|e| Ok((CodeUnit::try_from(e.code_unit)?, e.skeleton)))
                        .collect::<Result<Vec<_>, FragmentError>>()?;
                    fragment.skeletons = Some(rendered);
                }
                VirtualFragment::Skeleton(fragment)
            }
            VirtualFragmentDto::Usage {
                id,
                target_identifier,
            } => VirtualFragment::Usage(UsageFragment::new(id, target_identifier)?),
            VirtualFragmentDto::PasteText {
                id,
                text,
                description,
            } => VirtualFragment::PasteText(PasteTextFragment::new(id, text, description)),
            VirtualFragmentDto::PasteImage {
                id,
                base64_image_data,
                description,
            } => VirtualFragment::PasteImage(PasteImageFragment::new(
                id,
                base64_image_data,
                description,
            )?),
            VirtualFragmentDto::Stacktrace {
                id,
                sources,
                original,
                exception,
                code,
            } => VirtualFragment::Stacktrace(StacktraceFragment::new(
                id,
                collect_set(sources)?,
                original,
                exception,
                code,
            )),
            VirtualFragmentDto::CallGraph {
                id,
                method_name,
                depth,
                is_callee_graph,
            } => VirtualFragment::CallGraph(CallGraphFragment::new(
                id,
                method_name,
                depth,
                is_callee_graph,
            )?),
            VirtualFragmentDto::History { id, history } => {
                VirtualFragment::History(HistoryFragment::new(id, collect(history)?))
            }
            VirtualFragmentDto::Frozen(f) => {
                if f.original_type.is_path() {
                    return Err(FragmentError::WrongFamily(f.original_type));
                }
                VirtualFragment::Frozen(f.try_into()?)
            }
        })
    }
}

fn collect<D, T>(items: Vec<D>) -> Result<Vec<T>, FragmentError>
where
    T: TryFrom<D, Error = FragmentError>,
{
    items.into_iter().map(T::try_from).collect()
}

fn collect_set<D, T>(items: Vec<D>) -> Result<BTreeSet<T>, FragmentError>
where
    T: TryFrom<D, Error = FragmentError> + Ord,
{
    items.into_iter().map(T::try_from).collect()
}

impl ContextDto {
    /// Rebuild a context owned by `manager`.
    pub fn into_context(self, manager: Arc<dyn ContextManager>) -> Result<Context, DtoError> {
        let parts = ContextParts {
            id: self.id,
            editable: collect(self.editable)?,
            readonly: collect(self.readonly)?,
            virtuals: collect(self.virtuals)?,
            task_history: collect(self.task_history)?,
            parsed_output: None,
            action: ActionLabel::resolved(self.action),
        };
        Ok(Context::from_parts(manager, parts))
    }
}

impl Context {
    pub fn to_dto(&self) -> ContextDto {
        self.into()
    }

    pub fn to_json(&self) -> Result<String, DtoError> {
        Ok(serde_json::to_string(&self.to_dto())?)
    }

    pub fn from_json(json: &str, manager: Arc<dyn ContextManager>) -> Result<Context, DtoError> {
        let dto: ContextDto = serde_json::from_str(json)?;
        dto.into_context(manager)
    }
}
