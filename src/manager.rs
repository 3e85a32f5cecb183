//! User-facing workflows combining sync, timing and state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{sort_newest_completed_first, Task, TaskSummary};
use crate::persistence::Store;
use crate::sync::{TaskSync, TodoistClient};
use crate::tracking::{TaskState, TimeTracker};

#[derive(Debug, Clone)]
pub struct TaskManager {
    store: Arc<Store>,
    tracker: TimeTracker,
    sync: Arc<TaskSync>,
}

impl TaskManager {
    pub fn new(store: Arc<Store>, client: TodoistClient) -> Self {
        let tracker = TimeTracker::new(Arc::clone(&store));
        let sync = Arc::new(TaskSync::new(client, Arc::clone(&store)));
        Self { store, tracker, sync }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn tracker(&self) -> &TimeTracker {
        &self.tracker
    }

    pub fn state(&self) -> &TaskState {
        self.tracker.state()
    }

    /// Shared handle for the background scheduler
    pub fn task_sync(&self) -> Arc<TaskSync> {
        Arc::clone(&self.sync)
    }

    /// Refresh the cache, then start the timer.
    ///
    /// A failed refresh does not block starting a task that is already cached.
    pub async fn start_work(&self, task_id: &str, token: &str) -> bool {
        if !self.sync.sync(token).await {
            warn!(task_id, "Sync before start failed, using cached tasks");
        }
        let started = self.tracker.start(task_id);
        if started {
            info!(task_id, "Started work");
        }
        started
    }

    pub fn stop_work(&self, task_id: &str) -> bool {
        let stopped = self.tracker.stop(task_id);
        if stopped {
            info!(task_id, "Stopped work");
        }
        stopped
    }

    /// Close every open entry and clear the timer pointers
    pub fn stop_all_work(&self) -> usize {
        self.tracker.stop_all()
    }

    /// Stop the timer if it runs, close remotely, then mark locally.
    ///
    /// Every step runs even if an earlier one failed; the result is true only
    /// if all of them succeeded.
    pub async fn complete_task(&self, task_id: &str, token: &str) -> bool {
        let mut success = true;

        if self.state().is_task_active(task_id) && !self.tracker.stop(task_id) {
            warn!(task_id, "Could not stop timer while completing task");
            success = false;
        }

        if !self.sync.mark_complete_remote(task_id, token).await {
            success = false;
        }

        if !self.sync.mark_complete_local(task_id) {
            warn!(task_id, "Could not mark task completed locally");
            success = false;
        }

        info!(task_id, success, "Completed task");
        success
    }

    pub async fn sync(&self, token: &str) -> bool {
        self.sync.sync(token).await
    }

    pub fn task_summary(&self, task_id: &str) -> Option<TaskSummary> {
        self.task_summary_at(task_id, Utc::now())
    }

    pub fn task_summary_at(&self, task_id: &str, now: DateTime<Utc>) -> Option<TaskSummary> {
        let task = self.state().task_by_id(task_id)?;
        let time_entries = self.tracker.entries_for_task(task_id);
        let total_time_seconds = time_entries.iter().map(|entry| entry.duration_at(now)).sum();

        let is_active = self.state().is_task_active(task_id);
        let current_session_duration = if is_active {
            let entry_id = self.state().current_time_entry_id();
            self.tracker
                .current_session_duration_at(entry_id.as_deref(), now)
        } else {
            0
        };

        Some(TaskSummary {
            task,
            total_time_seconds,
            total_time_entries: time_entries.len(),
            is_active,
            current_session_duration,
            time_entries,
        })
    }

    pub fn active_task_summary(&self) -> Option<TaskSummary> {
        let active = self.state().active_task()?;
        self.task_summary(&active.id)
    }

    pub fn all_tasks(&self, include_completed: bool) -> Vec<Task> {
        let tasks = self.store.load_tasks();
        if include_completed {
            return tasks;
        }
        tasks.into_iter().filter(|task| !task.is_completed).collect()
    }

    pub fn incomplete_tasks(&self) -> Vec<Task> {
        self.all_tasks(false)
    }

    /// Completed tasks, most recently completed first
    pub fn completed_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .store
            .load_tasks()
            .into_iter()
            .filter(|task| task.is_completed)
            .collect();
        sort_newest_completed_first(&mut tasks);
        tasks
    }

    /// The running task, as a list of zero or one
    pub fn active_tasks(&self) -> Vec<Task> {
        self.state().active_task().into_iter().collect()
    }

    pub fn total_time(&self, task_id: &str) -> i64 {
        self.tracker.total_time(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_timestamp;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(value: &str) -> DateTime<Utc> {
        parse_timestamp(value).unwrap()
    }

    fn offline_manager() -> (TempDir, TaskManager) {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path()));
        let client = TodoistClient::new("http://127.0.0.1:9").unwrap();
        (dir, TaskManager::new(store, client))
    }

    fn completed(id: &str, at: Option<&str>) -> Task {
        let mut task = Task::new(id, id);
        task.is_completed = true;
        task.completed_at = at.map(str::to_string);
        task
    }

    #[tokio::test]
    async fn test_start_work_syncs_then_starts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "T1", "content": "Fresh"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path()));
        let manager = TaskManager::new(Arc::clone(&store), TodoistClient::new(server.uri()).unwrap());

        assert!(manager.start_work("T1", "token").await);
        assert_eq!(manager.state().active_task_id().as_deref(), Some("T1"));
        assert_eq!(manager.active_tasks().len(), 1);
        assert!(manager.stop_work("T1"));
        assert!(manager.active_tasks().is_empty());
    }

    #[tokio::test]
    async fn test_start_work_with_failed_sync_and_empty_cache() {
        let (_dir, manager) = offline_manager();
        assert!(!manager.start_work("T1", "token").await);
        assert!(manager.state().active_task_id().is_none());
    }

    #[tokio::test]
    async fn test_complete_task_marks_locally_when_remote_fails() {
        let (_dir, manager) = offline_manager();
        manager.store().save_tasks(&[Task::new("T1", "Write report")]);
        assert!(manager.tracker().start("T1"));

        assert!(!manager.complete_task("T1", "token").await);

        let task = manager.state().task_by_id("T1").unwrap();
        assert!(task.is_completed);
        assert!(task.completed_at.is_some());
        assert!(manager.state().active_task_id().is_none());
        assert!(manager.tracker().active_entry().is_none());
    }

    #[tokio::test]
    async fn test_complete_task_succeeds_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks/T1/close"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path()));
        store.save_tasks(&[Task::new("T1", "Write report")]);
        let manager = TaskManager::new(store, TodoistClient::new(server.uri()).unwrap());

        assert!(manager.complete_task("T1", "token").await);
        assert_eq!(manager.completed_tasks().len(), 1);
        assert!(manager.incomplete_tasks().is_empty());
    }

    #[test]
    fn test_task_summary_for_running_task() {
        let (_dir, manager) = offline_manager();
        manager.store().save_tasks(&[Task::new("T1", "Write report"), Task::new("T2", "Other")]);

        let tracker = manager.tracker();
        assert!(tracker.start_at("T1", at("2024-01-01T10:00:00Z")));
        assert!(tracker.stop_at("T1", at("2024-01-01T10:01:00Z")));
        assert!(tracker.start_at("T1", at("2024-01-01T11:00:00Z")));

        let summary = manager
            .task_summary_at("T1", at("2024-01-01T11:00:30Z"))
            .unwrap();
        assert_eq!(summary.task.id, "T1");
        assert_eq!(summary.total_time_seconds, 90);
        assert_eq!(summary.total_time_entries, 2);
        assert!(summary.is_active);
        assert_eq!(summary.current_session_duration, 30);

        let idle = manager.task_summary_at("T2", at("2024-01-01T11:00:30Z")).unwrap();
        assert!(!idle.is_active);
        assert_eq!(idle.current_session_duration, 0);
        assert_eq!(idle.total_time_entries, 0);

        assert!(manager.task_summary("missing").is_none());
        assert_eq!(manager.active_task_summary().unwrap().task.id, "T1");
    }

    #[test]
    fn test_active_summary_none_when_idle() {
        let (_dir, manager) = offline_manager();
        manager.store().save_tasks(&[Task::new("T1", "Write report")]);
        assert!(manager.active_task_summary().is_none());
    }

    #[test]
    fn test_listings() {
        let (_dir, manager) = offline_manager();
        manager.store().save_tasks(&[
            Task::new("open", "Open"),
            completed("old", Some("2024-01-01T00:00:00.000000Z")),
            completed("undated", None),
            completed("new", Some("2024-02-01T00:00:00.000000Z")),
        ]);

        assert_eq!(manager.all_tasks(true).len(), 4);
        let open: Vec<String> = manager.all_tasks(false).into_iter().map(|t| t.id).collect();
        assert_eq!(open, vec!["open".to_string()]);

        let done: Vec<String> = manager.completed_tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(done, vec!["new".to_string(), "old".to_string(), "undated".to_string()]);
    }

    #[test]
    fn test_stop_all_work_unsticks_timer() {
        let (_dir, manager) = offline_manager();
        manager.store().save_tasks(&[Task::new("T1", "Write report"), Task::new("T2", "Other")]);
        assert!(manager.tracker().start("T1"));

        assert_eq!(manager.stop_all_work(), 1);
        assert!(manager.state().active_task_id().is_none());
        assert!(manager.tracker().start("T2"));
    }

    #[tokio::test]
    async fn test_completing_twice_with_reachable_remote() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks/T1/close"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path()));
        store.save_tasks(&[Task::new("T1", "Write report")]);
        let manager = TaskManager::new(store, TodoistClient::new(server.uri()).unwrap());

        assert!(manager.complete_task("T1", "token").await);
        assert!(manager.complete_task("T1", "token").await);

        let task = manager.state().task_by_id("T1").unwrap();
        assert!(task.is_completed);
        assert!(task.completed_at.is_some());
        assert_eq!(manager.completed_tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_completing_twice_with_unreachable_remote() {
        let (_dir, manager) = offline_manager();
        manager.store().save_tasks(&[Task::new("T1", "Write report")]);

        assert!(!manager.complete_task("T1", "token").await);
        assert!(!manager.complete_task("T1", "token").await);

        let task = manager.state().task_by_id("T1").unwrap();
        assert!(task.is_completed);
        assert!(task.completed_at.is_some());
        assert!(manager.state().active_task_id().is_none());
    }
}
