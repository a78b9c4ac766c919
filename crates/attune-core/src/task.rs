use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ids::TaskId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Status after a checkbox toggle: completed goes back to todo,
    /// everything else becomes completed.
    pub fn toggled(self) -> Self {
        match self {
            Self::Completed => Self::Todo,
            _ => Self::Completed,
        }
    }

    /// Todo or in progress.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Todo | Self::InProgress)
    }
}

impl FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown task priority: {other}")),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as the server sends it, before the client assigns an identity.
///
/// Decoding is lenient: unknown status/priority strings fall back to the
/// defaults, numeric due dates and estimates are kept as strings, and any
/// fields the client does not model are preserved in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            category: None,
            due_date: None,
            estimated_time: None,
            subtasks: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A task held in the session, with its client-assigned identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(flatten)]
    pub draft: TaskDraft,
    pub received_at: DateTime<Utc>,
}

impl Task {
    pub fn from_draft(id: TaskId, draft: TaskDraft) -> Self {
        Self {
            id,
            draft,
            received_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.draft.title
    }

    pub fn status(&self) -> TaskStatus {
        self.draft.status
    }

    pub fn priority(&self) -> TaskPriority {
        self.draft.priority
    }
}

fn lenient_enum<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toggle_cycles_between_todo_and_completed() {
        assert_eq!(TaskStatus::Todo.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::InProgress.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::Cancelled.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::Completed.toggled(), TaskStatus::Todo);
    }

    #[test]
    fn pending_statuses() {
        assert!(TaskStatus::Todo.is_pending());
        assert!(TaskStatus::InProgress.is_pending());
        assert!(!TaskStatus::Completed.is_pending());
        assert!(!TaskStatus::Cancelled.is_pending());
    }

    #[test]
    fn draft_full_decode() {
        let draft: TaskDraft = serde_json::from_value(json!({
            "title": "Write report",
            "description": "Q3 numbers",
            "status": "in_progress",
            "priority": "high",
            "category": "work",
            "due_date": "2026-11-01",
            "estimated_time": "2 hours",
            "subtasks": ["outline", "draft"]
        }))
        .unwrap();
        assert_eq!(draft.title, "Write report");
        assert_eq!(draft.status, TaskStatus::InProgress);
        assert_eq!(draft.priority, TaskPriority::High);
        assert_eq!(draft.subtasks, vec!["outline", "draft"]);
        assert!(draft.extra.is_empty());
    }

    #[test]
    fn draft_minimal_gets_defaults() {
        let draft: TaskDraft = serde_json::from_value(json!({"title": "Call mom"})).unwrap();
        assert_eq!(draft.status, TaskStatus::Todo);
        assert_eq!(draft.priority, TaskPriority::Medium);
        assert!(draft.description.is_none());
        assert!(draft.subtasks.is_empty());
    }

    #[test]
    fn draft_unknown_enums_fall_back() {
        let draft: TaskDraft = serde_json::from_value(json!({
            "title": "x",
            "status": "blocked",
            "priority": 7
        }))
        .unwrap();
        assert_eq!(draft.status, TaskStatus::Todo);
        assert_eq!(draft.priority, TaskPriority::Medium);
    }

    #[test]
    fn draft_numeric_estimate_and_null_subtasks() {
        let draft: TaskDraft = serde_json::from_value(json!({
            "title": "x",
            "estimated_time": 45,
            "subtasks": null
        }))
        .unwrap();
        assert_eq!(draft.estimated_time.as_deref(), Some("45"));
        assert!(draft.subtasks.is_empty());
    }

    #[test]
    fn draft_keeps_unmodelled_fields() {
        let draft: TaskDraft =
            serde_json::from_value(json!({"title": "x", "project_id": 12})).unwrap();
        assert_eq!(draft.extra.get("project_id"), Some(&json!(12)));
    }

    #[test]
    fn draft_without_title_is_rejected() {
        let result = serde_json::from_value::<TaskDraft>(json!({"description": "no title"}));
        assert!(result.is_err());
    }

    #[test]
    fn task_serializes_flat() {
        let task = Task::from_draft(TaskId::from_raw("task_1"), TaskDraft::new("Ship it"));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], "task_1");
        assert_eq!(value["title"], "Ship it");
        assert_eq!(value["status"], "todo");
        assert!(value.get("draft").is_none());
    }
}
