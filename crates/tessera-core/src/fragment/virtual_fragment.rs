use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::frozen::FrozenFragment;
use super::FragmentType;
use crate::code_unit::CodeUnit;
use crate::error::FragmentError;
use crate::ids::FragmentId;
use crate::task::{ChatMessage, TaskEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    CodeUnitSkeleton,
    FileSkeletons,
}

impl SummaryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CodeUnitSkeleton => "code_unit_skeleton",
            Self::FileSkeletons => "file_skeletons",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FragmentError> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "" => Err(FragmentError::EmptyField {
                field: "summary_type",
            }),
            "code_unit_skeleton" | "codeunit_skeleton" => Ok(Self::CodeUnitSkeleton),
            "file_skeletons" => Ok(Self::FileSkeletons),
            _ => Err(FragmentError::UnknownSummaryType(s.to_string())),
        }
    }
}

// ── Variant payloads ──

/// A conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFragment {
    id: FragmentId,
    messages: Vec<ChatMessage>,
    session_name: String,
}

impl TaskFragment {
    pub fn new(id: FragmentId, messages: Vec<ChatMessage>, session_name: impl Into<String>) -> Self {
        Self {
            id,
            messages,
            session_name: session_name.into(),
        }
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }
}

#[derive(Debug, Clone)]
pub struct StringFragment {
    pub(crate) id: FragmentId,
    pub(crate) text: String,
    pub(crate) description: String,
    pub(crate) syntax_style: String,
}

impl StringFragment {
    pub fn new(
        id: FragmentId,
        text: impl Into<String>,
        description: impl Into<String>,
        syntax_style: impl Into<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            description: description.into(),
            syntax_style: syntax_style.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn syntax_style(&self) -> &str {
        &self.syntax_style
    }
}

#[derive(Debug, Clone)]
pub struct SearchFragment {
    pub(crate) id: FragmentId,
    pub(crate) query: String,
    pub(crate) explanation: String,
    pub(crate) sources: BTreeSet<CodeUnit>,
    pub(crate) messages: Vec<ChatMessage>,
}

impl SearchFragment {
    pub fn new(
        id: FragmentId,
        query: impl Into<String>,
        explanation: impl Into<String>,
        sources: BTreeSet<CodeUnit>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            id,
            query: query.into(),
            explanation: explanation.into(),
            sources,
            messages,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn sources(&self) -> &BTreeSet<CodeUnit> {
        &self.sources
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Skeleton summaries of classes or files.
///
/// Built either from target names (dynamic: rendered through the analyzer
/// on demand) or from already-rendered skeletons (static).
#[derive(Debug, Clone)]
pub struct SkeletonFragment {
    pub(crate) id: FragmentId,
    pub(crate) targets: Vec<String>,
    pub(crate) summary_type: SummaryType,
    pub(crate) skeletons: Option<Vec<(CodeUnit, String)>>,
}

impl SkeletonFragment {
    pub fn new(
        id: FragmentId,
        targets: Vec<String>,
        summary_type: SummaryType,
    ) -> Result<Self, FragmentError> {
        if targets.is_empty() || targets.iter().any(String::is_empty) {
            return Err(FragmentError::EmptyField {
                field: "target_identifiers",
            });
        }
        Ok(Self {
            id,
            targets,
            summary_type,
            skeletons: None,
        })
    }

    /// A static skeleton set; may be empty when nothing qualified.
    pub fn materialized(id: FragmentId, skeletons: Vec<(CodeUnit, String)>) -> Self {
        Self {
            id,
            targets: skeletons.iter().map(|(cu, _)| cu.fq_name()).collect(),
            summary_type: SummaryType::CodeUnitSkeleton,
            skeletons: Some(skeletons),
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn summary_type(&self) -> SummaryType {
        self.summary_type
    }

    pub fn skeletons(&self) -> Option<&[(CodeUnit, String)]> {
        self.skeletons.as_deref()
    }

    pub fn is_materialized(&self) -> bool {
        self.skeletons.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn description(&self) -> String {
        let names = self
            .targets
            .iter()
            .map(|t| match self.summary_type {
                SummaryType::CodeUnitSkeleton => {
                    t.rsplit('.').next().unwrap_or(t.as_str()).to_string()
                }
                SummaryType::FileSkeletons => {
                    t.rsplit('/').next().unwrap_or(t.as_str()).to_string()
                }
            })
            .collect::<Vec<_>>();
        format!("Summary of {}", names.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct UsageFragment {
    pub(crate) id: FragmentId,
    pub(crate) target: String,
}

impl UsageFragment {
    pub fn new(id: FragmentId, target: impl Into<String>) -> Result<Self, FragmentError> {
        let target = target.into();
        if target.is_empty() {
            return Err(FragmentError::EmptyField {
                field: "target_identifier",
            });
        }
        Ok(Self { id, target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Debug, Clone)]
pub struct PasteTextFragment {
    pub(crate) id: FragmentId,
    pub(crate) text: String,
    pub(crate) description: String,
}

impl PasteTextFragment {
    /// `description` is the resolved summary of the pasted content.
    pub fn new(id: FragmentId, text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            description: description.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn summary(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone)]
pub struct PasteImageFragment {
    pub(crate) id: FragmentId,
    pub(crate) base64_data: String,
    pub(crate) description: String,
}

impl PasteImageFragment {
    pub fn new(
        id: FragmentId,
        base64_data: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, FragmentError> {
        let base64_data = base64_data.into();
        if base64_data.is_empty() {
            return Err(FragmentError::EmptyField {
                field: "base64_image_data",
            });
        }
        STANDARD
            .decode(&base64_data)
            .map_err(|e| FragmentError::InvalidBase64(e.to_string()))?;
        Ok(Self {
            id,
            base64_data,
            description: description.into(),
        })
    }

    pub fn from_bytes(id: FragmentId, bytes: &[u8], description: impl Into<String>) -> Self {
        Self {
            id,
            base64_data: STANDARD.encode(bytes),
            description: description.into(),
        }
    }

    pub fn base64_data(&self) -> &str {
        &self.base64_data
    }

    pub fn summary(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone)]
pub struct StacktraceFragment {
    pub(crate) id: FragmentId,
    pub(crate) sources: BTreeSet<CodeUnit>,
    pub(crate) original: String,
    pub(crate) exception: String,
    pub(crate) code: String,
}

impl StacktraceFragment {
    pub fn new(
        id: FragmentId,
        sources: BTreeSet<CodeUnit>,
        original: impl Into<String>,
        exception: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sources,
            original: original.into(),
            exception: exception.into(),
            code: code.into(),
        }
    }

    pub fn sources(&self) -> &BTreeSet<CodeUnit> {
        &self.sources
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn exception(&self) -> &str {
        &self.exception
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

#[derive(Debug, Clone)]
pub struct CallGraphFragment {
    pub(crate) id: FragmentId,
    pub(crate) method_name: String,
    pub(crate) depth: u32,
    pub(crate) callees: bool,
}

impl CallGraphFragment {
    pub fn new(
        id: FragmentId,
        method_name: impl Into<String>,
        depth: i64,
        callees: bool,
    ) -> Result<Self, FragmentError> {
        let method_name = method_name.into();
        if method_name.is_empty() {
            return Err(FragmentError::EmptyField {
                field: "method_name",
            });
        }
        let depth = u32::try_from(depth)
            .ok()
            .filter(|d| *d > 0)
            .ok_or(FragmentError::NonPositiveDepth(depth))?;
        Ok(Self {
            id,
            method_name,
            depth,
            callees,
        })
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_callee_graph(&self) -> bool {
        self.callees
    }
}

#[derive(Debug, Clone)]
pub struct HistoryFragment {
    pub(crate) id: FragmentId,
    pub(crate) entries: Vec<TaskEntry>,
}

impl HistoryFragment {
    pub fn new(id: FragmentId, entries: Vec<TaskEntry>) -> Self {
        Self { id, entries }
    }

    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }
}

// ── VirtualFragment ──

/// A fragment not backed by a single file. Equality is by id.
#[derive(Debug, Clone)]
pub enum VirtualFragment {
    Task(TaskFragment),
    String(StringFragment),
    Search(SearchFragment),
    Skeleton(SkeletonFragment),
    Usage(UsageFragment),
    PasteText(PasteTextFragment),
    PasteImage(PasteImageFragment),
    Stacktrace(StacktraceFragment),
    CallGraph(CallGraphFragment),
    History(HistoryFragment),
    Frozen(FrozenFragment),
}

impl VirtualFragment {
    pub fn id(&self) -> FragmentId {
        match self {
            Self::Task(f) => f.id,
            Self::String(f) => f.id,
            Self::Search(f) => f.id,
            Self::Skeleton(f) => f.id,
            Self::Usage(f) => f.id,
            Self::PasteText(f) => f.id,
            Self::PasteImage(f) => f.id,
            Self::Stacktrace(f) => f.id,
            Self::CallGraph(f) => f.id,
            Self::History(f) => f.id,
            Self::Frozen(f) => f.id(),
        }
    }

    pub fn fragment_type(&self) -> FragmentType {
        match self {
            Self::Task(_) => FragmentType::Task,
            Self::String(_) => FragmentType::String,
            Self::Search(_) => FragmentType::Search,
            Self::Skeleton(_) => FragmentType::Skeleton,
            Self::Usage(_) => FragmentType::Usage,
            Self::PasteText(_) => FragmentType::PasteText,
            Self::PasteImage(_) => FragmentType::PasteImage,
            Self::Stacktrace(_) => FragmentType::Stacktrace,
            Self::CallGraph(_) => FragmentType::CallGraph,
            Self::History(_) => FragmentType::History,
            Self::Frozen(f) => f.original_type(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Task(f) if f.session_name.is_empty() => "Task".to_string(),
            Self::Task(f) => f.session_name.clone(),
            Self::String(f) => f.description.clone(),
            Self::Search(f) => format!("Search: {}", f.query),
            Self::Skeleton(f) => f.description(),
            Self::Usage(f) => format!("Uses of {}", f.target),
            Self::PasteText(f) => format!("Paste of {}", f.description),
            Self::PasteImage(f) => format!("Paste of {}", f.description),
            Self::Stacktrace(f) => format!("stacktrace of {}", f.exception),
            Self::CallGraph(f) => format!(
                "{} of {} (depth {})",
                if f.callees { "Callees" } else { "Callers" },
                f.method_name,
                f.depth
            ),
            Self::History(f) => {
                let n = f.entries.len();
                format!("Task history ({n} task{})", if n == 1 { "" } else { "s" })
            }
            Self::Frozen(f) => f.description().to_string(),
        }
    }

    /// Description with its first letter lower-cased, for inline use in labels.
    pub fn short_description(&self) -> String {
        if let Self::Frozen(f) = self {
            return f.short_description().to_string();
        }
        lowercase_first(&self.description())
    }

    /// Content is recomputed from the analyzer on each read.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Skeleton(f) => !f.is_materialized(),
            Self::Usage(_) | Self::CallGraph(_) => true,
            _ => false,
        }
    }

    /// Skeletons never seed auto-context; that would feed its own output back in.
    pub fn is_eligible_for_auto_context(&self) -> bool {
        self.fragment_type() != FragmentType::Skeleton
    }

    pub fn is_text(&self) -> bool {
        match self {
            Self::PasteImage(_) => false,
            Self::Frozen(f) => f.text().is_some(),
            _ => true,
        }
    }

    /// Stored text for static fragments; `None` for dynamic or image ones.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Task(f) => Some(render_messages(&f.messages)),
            Self::String(f) => Some(f.text.clone()),
            Self::Search(f) => Some(format!("{}\n\n{}", f.query, f.explanation)),
            Self::Skeleton(f) => f.skeletons.as_ref().map(|s| {
                s.iter()
                    .map(|(_, text)| text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }),
            Self::PasteText(f) => Some(f.text.clone()),
            Self::Stacktrace(f) => Some(format!("{}\n\n{}", f.original, f.code)),
            Self::History(f) => Some(
                f.entries
                    .iter()
                    .map(TaskEntry::render)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
            Self::Frozen(f) => f.text().map(str::to_string),
            Self::Usage(_) | Self::CallGraph(_) | Self::PasteImage(_) => None,
        }
    }
}

impl PartialEq for VirtualFragment {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for VirtualFragment {}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_id() {
        let a = VirtualFragment::String(StringFragment::new(FragmentId(1), "x", "Notes", "none"));
        let same_id = VirtualFragment::String(StringFragment::new(FragmentId(1), "y", "Other", "none"));
        let other = VirtualFragment::String(StringFragment::new(FragmentId(2), "x", "Notes", "none"));
        assert_eq!(a, same_id);
        assert_ne!(a, other);
    }

    #[test]
    fn short_description_lowercases_first_letter() {
        let f = VirtualFragment::Usage(UsageFragment::new(FragmentId(1), "p.A.run").unwrap());
        assert_eq!(f.description(), "Uses of p.A.run");
        assert_eq!(f.short_description(), "uses of p.A.run");
    }

    #[test]
    fn call_graph_depth_must_be_positive() {
        assert_eq!(
            CallGraphFragment::new(FragmentId(1), "p.A.run", 0, true).unwrap_err(),
            FragmentError::NonPositiveDepth(0)
        );
        assert!(CallGraphFragment::new(FragmentId(1), "p.A.run", -3, true).is_err());
        assert!(CallGraphFragment::new(FragmentId(1), "", 2, true).is_err());
        let cg = CallGraphFragment::new(FragmentId(1), "p.A.run", 2, false).unwrap();
        assert_eq!(
            VirtualFragment::CallGraph(cg).description(),
            "Callers of p.A.run (depth 2)"
        );
    }

    #[test]
    fn skeleton_targets_validated_unless_materialized() {
        assert!(SkeletonFragment::new(FragmentId(1), vec![], SummaryType::CodeUnitSkeleton).is_err());
        assert!(
            SkeletonFragment::new(FragmentId(1), vec!["".into()], SummaryType::CodeUnitSkeleton)
                .is_err()
        );
        let empty = SkeletonFragment::materialized(FragmentId(2), vec![]);
        assert!(empty.is_empty());
        let v = VirtualFragment::Skeleton(empty);
        assert!(!v.is_dynamic());
        assert!(!v.is_eligible_for_auto_context());
    }

    #[test]
    fn dynamic_variants() {
        let sk = SkeletonFragment::new(FragmentId(1), vec!["p.A".into()], SummaryType::CodeUnitSkeleton)
            .unwrap();
        assert!(VirtualFragment::Skeleton(sk.clone()).is_dynamic());
        assert_eq!(VirtualFragment::Skeleton(sk).description(), "Summary of A");
        let task = VirtualFragment::Task(TaskFragment::new(FragmentId(3), vec![], "t"));
        assert!(!task.is_dynamic());
        assert!(task.is_eligible_for_auto_context());
    }

    #[test]
    fn paste_image_rejects_bad_base64() {
        assert!(PasteImageFragment::new(FragmentId(1), "", "img").is_err());
        assert!(matches!(
            PasteImageFragment::new(FragmentId(1), "%%%", "img"),
            Err(FragmentError::InvalidBase64(_))
        ));
        let ok = PasteImageFragment::from_bytes(FragmentId(1), b"\x89PNG", "screenshot");
        assert!(PasteImageFragment::new(FragmentId(1), ok.base64_data(), "img").is_ok());
    }

    #[test]
    fn summary_type_parse_is_lenient_about_case() {
        assert_eq!(
            SummaryType::parse("CODEUNIT_SKELETON").unwrap(),
            SummaryType::CodeUnitSkeleton
        );
        assert_eq!(
            SummaryType::parse("file-skeletons").unwrap(),
            SummaryType::FileSkeletons
        );
        assert!(SummaryType::parse("").is_err());
    }
}
