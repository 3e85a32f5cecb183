use serde_json::Value;

use super::client::RemoteTask;
use crate::domain::{Task, DEFAULT_PRIORITY};

/// JSON identifier (string or number) as a string
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Normalize a remote task; `None` when it carries no usable id
pub fn to_local_task(remote: RemoteTask) -> Option<Task> {
    let id = id_to_string(&remote.id)?;

    let due_date = remote.due.and_then(|due| {
        non_empty(due.datetime).or_else(|| non_empty(due.date))
    });

    Some(Task {
        id,
        content: remote.content.unwrap_or_default(),
        description: non_empty(remote.description),
        due_date,
        priority: remote.priority.unwrap_or(DEFAULT_PRIORITY),
        project_id: remote.project_id.as_ref().and_then(id_to_string),
        labels: remote.labels.unwrap_or_default(),
        is_completed: remote.is_completed.unwrap_or(false),
        completed_at: non_empty(remote.completed_at),
        order: remote.order.unwrap_or(0),
        url: non_empty(remote.url),
    })
}
