//! Remote task synchronization
//!
//! [`TaskSync`] pulls the open task list from Todoist and overwrites the local
//! cache; [`SyncScheduler`] repeats that in the background

pub mod client;
mod convert;
pub mod scheduler;

pub use client::{RemoteDue, RemoteError, RemoteTask, TodoistClient, DEFAULT_API_BASE};
pub use convert::to_local_task;
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_INTERVAL_SECS, MIN_SYNC_INTERVAL_SECS};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{format_timestamp, Task};
use crate::persistence::Store;
use crate::tracking::TaskState;

/// Result of one pull from the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Tasks written to the local cache
    pub fetched: usize,
    /// The fetch failed and an empty list was written instead
    pub degraded: bool,
    /// The local write succeeded
    pub saved: bool,
}

/// Keeps the local task cache in step with Todoist
#[derive(Debug, Clone)]
pub struct TaskSync {
    client: TodoistClient,
    store: Arc<Store>,
    state: TaskState,
}

impl TaskSync {
    pub fn new(client: TodoistClient, store: Arc<Store>) -> Self {
        let state = TaskState::new(Arc::clone(&store));
        Self { client, store, state }
    }

    pub fn client(&self) -> &TodoistClient {
        &self.client
    }

    /// Fetch and normalize all open tasks
    pub async fn try_fetch_tasks(&self, token: &str) -> Result<Vec<Task>, RemoteError> {
        let remote = self.client.get_tasks(token).await?;
        let total = remote.len();
        let tasks: Vec<Task> = remote.into_iter().filter_map(to_local_task).collect();
        if tasks.len() < total {
            warn!(skipped = total - tasks.len(), "Remote tasks without an id were dropped");
        }
        Ok(tasks)
    }

    /// Fetch all open tasks, empty on any failure
    pub async fn fetch_tasks(&self, token: &str) -> Vec<Task> {
        self.try_fetch_tasks(token).await.unwrap_or_else(|err| {
            warn!(error = %err, "Failed to fetch tasks from Todoist");
            Vec::new()
        })
    }

    /// Pull remote tasks and overwrite the local cache
    ///
    /// A failed fetch still replaces the cache with an empty list, flagged as
    /// `degraded` in the outcome
    pub async fn sync_outcome(&self, token: &str) -> SyncOutcome {
        let (tasks, degraded) = match self.try_fetch_tasks(token).await {
            Ok(tasks) => (tasks, false),
            Err(err) => {
                warn!(error = %err, "Sync fetch failed, writing an empty task list");
                (Vec::new(), true)
            }
        };

        let saved = self.store.save_tasks(&tasks);
        if saved {
            let stamped = self.state.set_last_sync(Some(&format_timestamp(Utc::now())));
            if !stamped {
                warn!("Tasks synced but last_sync could not be recorded");
            }
        }

        let outcome = SyncOutcome {
            fetched: tasks.len(),
            degraded,
            saved,
        };
        info!(
            fetched = outcome.fetched,
            degraded = outcome.degraded,
            saved = outcome.saved,
            "Task sync finished"
        );
        outcome
    }

    /// Pull remote tasks; false only if the local write failed
    pub async fn sync(&self, token: &str) -> bool {
        self.sync_outcome(token).await.saved
    }

    /// Close the task on Todoist
    pub async fn mark_complete_remote(&self, task_id: &str, token: &str) -> bool {
        match self.client.close_task(token, task_id).await {
            Ok(()) => {
                debug!(task_id, "Task closed on Todoist");
                true
            }
            Err(err) => {
                warn!(task_id, error = %err, "Failed to close task on Todoist");
                false
            }
        }
    }

    /// Mark the cached task completed now
    pub fn mark_complete_local(&self, task_id: &str) -> bool {
        self.mark_complete_local_at(task_id, Utc::now())
    }

    /// Mark the cached task completed at `now`; false if it is not cached
    pub fn mark_complete_local_at(&self, task_id: &str, now: DateTime<Utc>) -> bool {
        let completed_at = format_timestamp(now);
        self.store.modify_tasks(|tasks| {
            match tasks.iter_mut().find(|task| task.id == task_id) {
                Some(task) => {
                    task.mark_completed(&completed_at);
                    true
                }
                None => {
                    debug!(task_id, "Cannot complete locally: task not cached");
                    false
                }
            }
        })
    }

    /// Check a token against the project listing
    pub async fn check_token(&self, token: &str) -> bool {
        match self.client.get_projects(token).await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "Token check failed");
                false
            }
        }
    }
}
