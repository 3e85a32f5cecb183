use super::entry::TimeEntry;
use serde::{Deserialize, Serialize};

/// Lowest Todoist priority, used when the remote omits one
pub const DEFAULT_PRIORITY: i64 = 1;

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

/// A remote to-do item mirrored into the local cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    /// ISO-8601 date or date-time
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            description: None,
            due_date: None,
            priority: DEFAULT_PRIORITY,
            project_id: None,
            labels: Vec::new(),
            is_completed: false,
            completed_at: None,
            order: 0,
            url: None,
        }
    }

    /// Flag the task as done at the given timestamp
    pub fn mark_completed(&mut self, completed_at: &str) {
        self.is_completed = true;
        self.completed_at = Some(completed_at.to_string());
    }
}

/// Sort completed tasks newest first; tasks without a completion time go last
pub fn sort_newest_completed_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        let a_key = a.completed_at.as_deref().unwrap_or("");
        let b_key = b.completed_at.as_deref().unwrap_or("");
        b_key.cmp(a_key)
    });
}

/// Read-only view combining a task with its tracked time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task: Task,
    pub total_time_seconds: i64,
    pub total_time_entries: usize,
    pub is_active: bool,
    /// Live duration of the running session, 0 when the task is not active
    pub current_session_duration: i64,
    pub time_entries: Vec<TimeEntry>,
}
