use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FragmentError;
use crate::file::ProjectFile;
use crate::fragment::TaskFragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FragmentError> {
        match s.to_ascii_lowercase().as_str() {
            "" => Err(FragmentError::EmptyField { field: "role" }),
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" | "ai" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            _ => Err(FragmentError::UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// One step of task history: either the full conversation log or a
/// compressed summary of it, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    sequence: u32,
    log: Option<TaskFragment>,
    summary: Option<String>,
}

impl TaskEntry {
    pub fn new(
        sequence: u32,
        log: Option<TaskFragment>,
        summary: Option<String>,
    ) -> Result<Self, FragmentError> {
        match (&log, &summary) {
            (Some(_), None) => {}
            (None, Some(s)) if s.is_empty() => {
                return Err(FragmentError::EmptyField { field: "summary" })
            }
            (None, Some(_)) => {}
            _ => return Err(FragmentError::TaskEntryArity),
        }
        Ok(Self {
            sequence,
            log,
            summary,
        })
    }

    pub fn from_log(sequence: u32, log: TaskFragment) -> Self {
        Self {
            sequence,
            log: Some(log),
            summary: None,
        }
    }

    pub fn from_summary(sequence: u32, summary: impl Into<String>) -> Result<Self, FragmentError> {
        Self::new(sequence, None, Some(summary.into()))
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn log(&self) -> Option<&TaskFragment> {
        self.log.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_compressed(&self) -> bool {
        self.summary.is_some()
    }

    pub(crate) fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Plain-text rendering used when history is shown to a model.
    pub fn render(&self) -> String {
        match (&self.log, &self.summary) {
            (_, Some(summary)) => format!("# Task {}\n{}", self.sequence, summary),
            (Some(log), None) => {
                let body = log
                    .messages()
                    .iter()
                    .map(|m| format!("{}: {}", m.role.as_str(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("# Task {}: {}\n{}", self.sequence, log.session_name(), body)
            }
            (None, None) => format!("# Task {}", self.sequence),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Success,
    Interrupted,
    Error,
}

/// Outcome of one user-visible task: conversation log plus the
/// pre-edit contents of every file the task touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub action_description: String,
    pub messages: Vec<ChatMessage>,
    pub original_contents: BTreeMap<ProjectFile, String>,
    pub stop_reason: StopReason,
}

impl TaskResult {
    pub fn new(action_description: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            action_description: action_description.into(),
            messages,
            original_contents: BTreeMap::new(),
            stop_reason: StopReason::Success,
        }
    }

    pub fn with_original_contents(mut self, contents: BTreeMap<ProjectFile, String>) -> Self {
        self.original_contents = contents;
        self
    }

    pub fn with_stop_reason(mut self, reason: StopReason) -> Self {
        self.stop_reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FragmentId;

    fn log() -> TaskFragment {
        TaskFragment::new(FragmentId(1), vec![ChatMessage::user("hi")], "greet")
    }

    #[test]
    fn entry_requires_exactly_one_of_log_or_summary() {
        assert_eq!(
            TaskEntry::new(1, None, None).unwrap_err(),
            FragmentError::TaskEntryArity
        );
        assert_eq!(
            TaskEntry::new(1, Some(log()), Some("s".into())).unwrap_err(),
            FragmentError::TaskEntryArity
        );
        assert!(TaskEntry::new(1, Some(log()), None).is_ok());
        assert!(TaskEntry::new(1, None, Some("s".into())).is_ok());
    }

    #[test]
    fn empty_summary_is_rejected() {
        assert_eq!(
            TaskEntry::from_summary(3, "").unwrap_err(),
            FragmentError::EmptyField { field: "summary" }
        );
    }

    #[test]
    fn render_prefers_summary() {
        let e = TaskEntry::from_summary(2, "did things").unwrap();
        assert!(e.is_compressed());
        assert_eq!(e.render(), "# Task 2\ndid things");
        let l = TaskEntry::from_log(1, log());
        assert!(l.render().contains("user: hi"));
    }

    #[test]
    fn role_parse_accepts_ai_alias() {
        assert_eq!(MessageRole::parse("AI").unwrap(), MessageRole::Assistant);
        assert!(matches!(
            MessageRole::parse(""),
            Err(FragmentError::EmptyField { .. })
        ));
        assert!(MessageRole::parse("robot").is_err());
    }
}
