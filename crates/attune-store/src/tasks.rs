//! Read-side task views: filtering and grouping for display.

use std::str::FromStr;

use attune_core::{Task, TaskPriority, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    #[default]
    All,
    Completed,
    /// `todo` or `in_progress`.
    Pending,
    HighPriority,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Completed => task.status() == TaskStatus::Completed,
            Self::Pending => task.status().is_pending(),
            Self::HighPriority => task.priority() == TaskPriority::High,
        }
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "completed" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            "high_priority" | "high-priority" => Ok(Self::HighPriority),
            other => Err(format!("unknown task filter: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskGrouping {
    Category,
    Priority,
    Date,
    #[default]
    None,
}

impl TaskGrouping {
    /// Lenient parse of a `groupBy` option; anything unrecognised means no
    /// grouping.
    pub fn parse(s: &str) -> Self {
        match s {
            "category" => Self::Category,
            "priority" => Self::Priority,
            "date" => Self::Date,
            _ => Self::None,
        }
    }

    pub fn key_for(self, task: &Task) -> String {
        match self {
            Self::Category => task
                .draft
                .category
                .clone()
                .unwrap_or_else(|| "Other".to_owned()),
            Self::Priority => task.priority().as_str().to_owned(),
            Self::Date => task
                .draft
                .due_date
                .clone()
                .unwrap_or_else(|| "No date".to_owned()),
            Self::None => "all".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskGroup {
    pub key: String,
    pub tasks: Vec<Task>,
}

pub fn filter_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>, filter: TaskFilter) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|t| filter.matches(t))
        .cloned()
        .collect()
}

/// Group `tasks` preserving order: groups appear in the order their first
/// member does, members keep their relative order.
pub fn group_tasks(tasks: Vec<Task>, grouping: TaskGrouping) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = Vec::new();
    for task in tasks {
        let key = grouping.key_for(&task);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.tasks.push(task),
            None => groups.push(TaskGroup {
                key,
                tasks: vec![task],
            }),
        }
    }
    groups
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high_priority: usize,
}

impl TaskCounts {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut c, t| {
            c.total += 1;
            c.completed += usize::from(TaskFilter::Completed.matches(t));
            c.pending += usize::from(TaskFilter::Pending.matches(t));
            c.high_priority += usize::from(TaskFilter::HighPriority.matches(t));
            c
        })
    }
}
