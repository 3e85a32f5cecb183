use super::files::{atomic_write, ensure_dir, read_file};
use crate::domain::{now_iso, ApplicationState, Task, TimeEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// Schema version written into every document
pub const DOCUMENT_VERSION: &str = "1";

pub const TASKS_FILE: &str = "tasks.json";
pub const TIME_TRACKING_FILE: &str = "time_tracking.json";
pub const STATE_FILE: &str = "state.json";
pub const EXPORTS_DIR: &str = "exports";

/// Errors raised while reading or writing the JSON documents
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

fn document_version() -> String {
    DOCUMENT_VERSION.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct TasksDocument {
    #[serde(default = "document_version")]
    version: String,
    #[serde(default)]
    last_updated: Option<String>,
    tasks: Vec<Task>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimeEntriesDocument {
    #[serde(default = "document_version")]
    version: String,
    entries: Vec<TimeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default = "document_version")]
    version: String,
    state: ApplicationState,
}

/// Borrowed counterparts used when writing, to avoid cloning collections
#[derive(Serialize)]
struct TasksDocumentRef<'a> {
    version: &'a str,
    last_updated: String,
    tasks: &'a [Task],
}

#[derive(Serialize)]
struct TimeEntriesDocumentRef<'a> {
    version: &'a str,
    entries: &'a [TimeEntry],
}

#[derive(Serialize)]
struct StateDocumentRef<'a> {
    version: &'a str,
    state: &'a ApplicationState,
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// File-backed owner of the task, time entry, and state documents.
///
/// Reads never fail: a missing or corrupt document yields the default value.
/// Writes report success as a bool. Each document has its own lock so a
/// read-modify-write cannot interleave with another writer of the same file,
/// and `timer_guard` serializes whole timer transitions spanning documents.
#[derive(Debug)]
pub struct Store {
    data_dir: PathBuf,
    tasks_lock: Mutex<()>,
    entries_lock: Mutex<()>,
    state_lock: Mutex<()>,
    timer_lock: Mutex<()>,
}

impl Store {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            tasks_lock: Mutex::new(()),
            entries_lock: Mutex::new(()),
            state_lock: Mutex::new(()),
            timer_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE)
    }

    pub fn time_tracking_path(&self) -> PathBuf {
        self.data_dir.join(TIME_TRACKING_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    /// Get the exports directory, creating it if needed
    pub fn exports_dir(&self) -> anyhow::Result<PathBuf> {
        ensure_dir(self.data_dir.join(EXPORTS_DIR))
    }

    /// Hold this while performing a timer transition (start/stop/stop-all)
    pub(crate) fn timer_guard(&self) -> MutexGuard<'_, ()> {
        lock(&self.timer_lock)
    }

    pub fn try_load_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let document: Option<TasksDocument> = read_document(&self.tasks_path())?;
        Ok(document.map(|doc| doc.tasks).unwrap_or_default())
    }

    /// Load tasks from the local cache, empty on failure
    pub fn load_tasks(&self) -> Vec<Task> {
        self.try_load_tasks().unwrap_or_else(|err| {
            warn!(error = %err, "Falling back to an empty task cache");
            Vec::new()
        })
    }

    /// Replace the whole task cache
    pub fn save_tasks(&self, tasks: &[Task]) -> bool {
        let _guard = lock(&self.tasks_lock);
        self.write_tasks(tasks)
    }

    /// Read-modify-write the task cache; `apply` returns false to skip saving
    pub fn modify_tasks<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut Vec<Task>) -> bool,
    {
        let _guard = lock(&self.tasks_lock);
        let mut tasks = self.load_tasks();
        if !apply(&mut tasks) {
            return false;
        }
        self.write_tasks(&tasks)
    }

    fn write_tasks(&self, tasks: &[Task]) -> bool {
        let document = TasksDocumentRef {
            version: DOCUMENT_VERSION,
            last_updated: now_iso(),
            tasks,
        };
        report_write(write_document(&self.tasks_path(), &document))
    }

    pub fn try_load_time_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
        let document: Option<TimeEntriesDocument> = read_document(&self.time_tracking_path())?;
        Ok(document.map(|doc| doc.entries).unwrap_or_default())
    }

    /// Load time entries, empty on failure
    pub fn load_time_entries(&self) -> Vec<TimeEntry> {
        self.try_load_time_entries().unwrap_or_else(|err| {
            warn!(error = %err, "Falling back to an empty time entry list");
            Vec::new()
        })
    }

    pub fn save_time_entries(&self, entries: &[TimeEntry]) -> bool {
        let _guard = lock(&self.entries_lock);
        self.write_time_entries(entries)
    }

    /// Read-modify-write the time entries; `apply` returns false to skip saving
    pub fn modify_time_entries<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut Vec<TimeEntry>) -> bool,
    {
        let _guard = lock(&self.entries_lock);
        let mut entries = self.load_time_entries();
        if !apply(&mut entries) {
            return false;
        }
        self.write_time_entries(&entries)
    }

    fn write_time_entries(&self, entries: &[TimeEntry]) -> bool {
        let document = TimeEntriesDocumentRef {
            version: DOCUMENT_VERSION,
            entries,
        };
        report_write(write_document(&self.time_tracking_path(), &document))
    }

    pub fn try_load_state(&self) -> Result<ApplicationState, StoreError> {
        let document: Option<StateDocument> = read_document(&self.state_path())?;
        Ok(document.map(|doc| doc.state).unwrap_or_default())
    }

    /// Load application state, default (all pointers empty) on failure
    pub fn load_state(&self) -> ApplicationState {
        self.try_load_state().unwrap_or_else(|err| {
            warn!(error = %err, "Falling back to default application state");
            ApplicationState::default()
        })
    }

    pub fn save_state(&self, state: &ApplicationState) -> bool {
        let _guard = lock(&self.state_lock);
        self.write_state(state)
    }

    /// Read-modify-write the whole state record
    pub fn modify_state<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut ApplicationState),
    {
        let _guard = lock(&self.state_lock);
        let mut state = self.load_state();
        apply(&mut state);
        self.write_state(&state)
    }

    fn write_state(&self, state: &ApplicationState) -> bool {
        let document = StateDocumentRef {
            version: DOCUMENT_VERSION,
            state,
        };
        report_write(write_document(&self.state_path(), &document))
    }
}

/// Read and parse a document, `None` if the file doesn't exist
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = read_file(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match content {
        Some(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            }),
        None => Ok(None),
    }
}

fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(document).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    atomic_write(path, &json).map_err(|err| StoreError::Write {
        path: path.to_path_buf(),
        message: format!("{:#}", err),
    })?;

    debug!(path = %path.display(), "Document written");
    Ok(())
}

fn report_write(result: Result<(), StoreError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "Failed to persist document");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_documents_returns_defaults() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());

        assert!(store.load_tasks().is_empty());
        assert!(store.load_time_entries().is_empty());
        assert_eq!(store.load_state(), ApplicationState::default());
    }

    #[test]
    fn test_corrupt_documents_degrade_to_defaults() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());
        fs::write(store.tasks_path(), "{ not json").unwrap();
        fs::write(store.time_tracking_path(), r#"{"version": "1"}"#).unwrap();
        fs::write(store.state_path(), "[]").unwrap();

        assert!(store.load_tasks().is_empty());
        assert!(store.load_time_entries().is_empty());
        assert_eq!(store.load_state(), ApplicationState::default());

        // The fallible variants still expose what went wrong
        assert!(matches!(store.try_load_tasks(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_save_and_load_tasks() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());

        let tasks = vec![Task::new("1", "First"), Task::new("2", "Second")];
        assert!(store.save_tasks(&tasks));
        assert_eq!(store.load_tasks(), tasks);
    }

    #[test]
    fn test_tasks_document_layout() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());
        assert!(store.save_tasks(&[Task::new("1", "First")]));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.tasks_path()).unwrap()).unwrap();
        assert_eq!(raw["version"], "1");
        assert!(raw["last_updated"].as_str().unwrap().ends_with('Z'));
        assert_eq!(raw["tasks"][0]["id"], "1");
    }

    #[test]
    fn test_time_entries_and_state_document_layout() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());

        let entry = TimeEntry::open("1", "2024-01-01T00:00:00Z");
        assert!(store.save_time_entries(&[entry.clone()]));
        let state = ApplicationState {
            active_task_id: Some("1".to_string()),
            ..Default::default()
        };
        assert!(store.save_state(&state));

        let entries: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.time_tracking_path()).unwrap()).unwrap();
        assert_eq!(entries["version"], "1");
        assert_eq!(entries["entries"][0]["entry_id"], entry.entry_id.as_str());
        assert!(entries["entries"][0]["stop_time"].is_null());

        let raw_state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.state_path()).unwrap()).unwrap();
        assert_eq!(raw_state["state"]["active_task_id"], "1");
        assert_eq!(store.load_state(), state);
    }

    #[test]
    fn test_save_creates_missing_data_dir() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path().join("fresh"));
        assert!(store.save_state(&ApplicationState::default()));
        assert!(store.state_path().exists());
    }

    #[test]
    fn test_save_failure_returns_false() {
        let temp_dir = tempdir().unwrap();
        // A regular file where the data directory should be
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let store = Store::new(&blocker);

        assert!(!store.save_tasks(&[Task::new("1", "First")]));
    }

    #[test]
    fn test_modify_tasks_skips_save_when_rejected() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());
        assert!(store.save_tasks(&[Task::new("1", "First")]));

        assert!(!store.modify_tasks(|tasks| {
            tasks.clear();
            false
        }));
        assert_eq!(store.load_tasks().len(), 1);
    }

    #[test]
    fn test_concurrent_state_updates_do_not_lose_fields() {
        use std::sync::Arc;
        use std::thread;

        let temp_dir = tempdir().unwrap();
        let store = Arc::new(Store::new(temp_dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        store.modify_state(|state| state.last_sync = Some(format!("sync-{}", i)))
                    } else {
                        store.modify_state(|state| state.session_start = Some(format!("session-{}", i)))
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let state = store.load_state();
        assert!(state.last_sync.is_some());
        assert!(state.session_start.is_some());
    }

    #[test]
    fn test_exports_dir_is_created() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path());
        let exports = store.exports_dir().unwrap();
        assert!(exports.is_dir());
        assert!(exports.ends_with(EXPORTS_DIR));
    }
}
