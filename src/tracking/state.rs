use crate::domain::{ApplicationState, Task};
use crate::persistence::Store;
use std::sync::Arc;

/// Accessors for the session pointers kept in `state.json`.
///
/// Every call re-reads the store; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct TaskState {
    store: Arc<Store>,
}

impl TaskState {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn read(&self) -> ApplicationState {
        self.store.load_state()
    }

    pub fn active_task_id(&self) -> Option<String> {
        self.read().active_task_id
    }

    pub fn set_active_task_id(&self, task_id: Option<&str>) -> bool {
        let task_id = task_id.map(str::to_owned);
        self.store.modify_state(|state| state.active_task_id = task_id)
    }

    /// Resolve the active task against the cache (`None` if it was synced away)
    pub fn active_task(&self) -> Option<Task> {
        let active_id = self.active_task_id()?;
        self.task_by_id(&active_id)
    }

    pub fn is_task_active(&self, task_id: &str) -> bool {
        self.active_task_id().as_deref() == Some(task_id)
    }

    pub fn clear_active_task(&self) -> bool {
        self.set_active_task_id(None)
    }

    pub fn current_time_entry_id(&self) -> Option<String> {
        self.read().current_time_entry_id
    }

    pub fn set_current_time_entry_id(&self, entry_id: Option<&str>) -> bool {
        let entry_id = entry_id.map(str::to_owned);
        self.store.modify_state(|state| state.current_time_entry_id = entry_id)
    }

    pub fn clear_current_time_entry_id(&self) -> bool {
        self.set_current_time_entry_id(None)
    }

    pub fn session_start(&self) -> Option<String> {
        self.read().session_start
    }

    pub fn set_session_start(&self, timestamp: Option<&str>) -> bool {
        let timestamp = timestamp.map(str::to_owned);
        self.store.modify_state(|state| state.session_start = timestamp)
    }

    pub fn start_session(&self, timestamp: &str) -> bool {
        self.set_session_start(Some(timestamp))
    }

    pub fn clear_session(&self) -> bool {
        self.set_session_start(None)
    }

    pub fn last_sync(&self) -> Option<String> {
        self.read().last_sync
    }

    pub fn set_last_sync(&self, timestamp: Option<&str>) -> bool {
        let timestamp = timestamp.map(str::to_owned);
        self.store.modify_state(|state| state.last_sync = timestamp)
    }

    pub fn task_by_id(&self, task_id: &str) -> Option<Task> {
        self.store.load_tasks().into_iter().find(|task| task.id == task_id)
    }

    pub fn task_exists(&self, task_id: &str) -> bool {
        self.task_by_id(task_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn state_with_tasks(dir: &std::path::Path) -> TaskState {
        let store = Arc::new(Store::new(dir));
        store.save_tasks(&[Task::new("t1", "Write report"), Task::new("t2", "Review PR")]);
        TaskState::new(store)
    }

    #[test]
    fn test_active_task_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let state = state_with_tasks(temp_dir.path());

        assert!(state.active_task_id().is_none());
        assert!(state.set_active_task_id(Some("t1")));
        assert_eq!(state.active_task_id().as_deref(), Some("t1"));
        assert!(state.is_task_active("t1"));
        assert!(!state.is_task_active("t2"));
        assert_eq!(state.active_task().map(|t| t.content), Some("Write report".to_string()));

        assert!(state.clear_active_task());
        assert!(state.active_task().is_none());
    }

    #[test]
    fn test_active_task_missing_from_cache() {
        let temp_dir = tempdir().unwrap();
        let state = state_with_tasks(temp_dir.path());

        state.set_active_task_id(Some("gone"));
        assert_eq!(state.active_task_id().as_deref(), Some("gone"));
        assert!(state.active_task().is_none());
    }

    #[test]
    fn test_setters_preserve_other_fields() {
        let temp_dir = tempdir().unwrap();
        let state = state_with_tasks(temp_dir.path());

        state.set_active_task_id(Some("t1"));
        state.set_current_time_entry_id(Some("time-123"));
        state.start_session("2024-01-01T00:00:00Z");
        state.set_last_sync(Some("2024-01-01T00:00:01Z"));

        assert_eq!(state.active_task_id().as_deref(), Some("t1"));
        assert_eq!(state.current_time_entry_id().as_deref(), Some("time-123"));
        assert_eq!(state.session_start().as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(state.last_sync().as_deref(), Some("2024-01-01T00:00:01Z"));

        state.clear_session();
        state.clear_current_time_entry_id();
        assert!(state.session_start().is_none());
        assert!(state.current_time_entry_id().is_none());
        assert_eq!(state.active_task_id().as_deref(), Some("t1"));
    }

    #[test]
    fn test_task_lookup() {
        let temp_dir = tempdir().unwrap();
        let state = state_with_tasks(temp_dir.path());

        assert!(state.task_exists("t2"));
        assert!(!state.task_exists("t3"));
        assert_eq!(state.task_by_id("t2").unwrap().content, "Review PR");
    }
}
