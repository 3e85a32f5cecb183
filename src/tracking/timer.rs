use super::state::TaskState;
use crate::domain::{format_timestamp, TimeEntry};
use crate::persistence::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The single-active-timer state machine.
///
/// A task is either Idle (no open entry) or Running (exactly one open entry,
/// and it is the system-wide active task). At most one open entry exists in
/// the store at any time; `start` refuses to open a second one.
#[derive(Debug, Clone)]
pub struct TimeTracker {
    store: Arc<Store>,
    state: TaskState,
}

impl TimeTracker {
    pub fn new(store: Arc<Store>) -> Self {
        let state = TaskState::new(Arc::clone(&store));
        Self { store, state }
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Start timing a task now
    pub fn start(&self, task_id: &str) -> bool {
        self.start_at(task_id, Utc::now())
    }

    /// Start timing a task at `now`.
    ///
    /// Fails without mutating anything if the task is not cached locally or
    /// another timer is running. The entry is saved before the state pointers.
    pub fn start_at(&self, task_id: &str, now: DateTime<Utc>) -> bool {
        let _timer = self.store.timer_guard();

        if !self.state.task_exists(task_id) {
            debug!(task_id, "Cannot start timer: task not in local cache");
            return false;
        }

        if let Some(active) = self.state.active_task_id() {
            debug!(task_id, active_task_id = %active, "Cannot start timer: another task is active");
            return false;
        }

        let started = format_timestamp(now);
        let entry = TimeEntry::open(task_id, &started);
        let entry_id = entry.entry_id.clone();

        let saved = self.store.modify_time_entries(|entries| {
            if let Some(open) = entries.iter().find(|e| e.is_open()) {
                warn!(
                    task_id,
                    open_entry_id = %open.entry_id,
                    "Cannot start timer: an open entry already exists"
                );
                return false;
            }
            entries.push(entry);
            true
        });
        if !saved {
            return false;
        }

        self.point_at_running(task_id, &entry_id, &started);

        info!(task_id, entry_id = %entry_id, "Timer started");
        true
    }

    /// Stop timing a task now
    pub fn stop(&self, task_id: &str) -> bool {
        self.stop_at(task_id, Utc::now())
    }

    /// Stop the active task's open entry at `now` and freeze its duration.
    ///
    /// If the task is active but has no open entry (lost or corrupt entries
    /// file), the pointers are cleared so a new timer can start, and false
    /// is returned.
    pub fn stop_at(&self, task_id: &str, now: DateTime<Utc>) -> bool {
        let _timer = self.store.timer_guard();

        if !self.state.is_task_active(task_id) {
            debug!(task_id, "Cannot stop timer: task is not active");
            return false;
        }

        let stopped = format_timestamp(now);
        let mut closed: Option<(String, i64)> = None;

        let saved = self.store.modify_time_entries(|entries| {
            match entries.iter_mut().find(|e| e.task_id == task_id && e.is_open()) {
                Some(entry) => {
                    entry.close(&stopped);
                    closed = Some((entry.entry_id.clone(), entry.duration_seconds));
                    true
                }
                None => false,
            }
        });

        let Some((entry_id, duration_seconds)) = closed else {
            warn!(task_id, "Active task has no open entry, clearing timer pointers");
            self.store.modify_state(|state| state.clear_timer());
            return false;
        };
        if !saved {
            warn!(task_id, entry_id = %entry_id, "Cannot stop timer: closed entry was not saved");
            return false;
        }

        if !self.store.modify_state(|state| state.clear_timer()) {
            warn!(task_id, "Timer stopped but state pointers were not cleared");
        }

        info!(task_id, entry_id = %entry_id, duration_seconds, "Timer stopped");
        true
    }

    /// Close every open entry and clear the pointers (cleanup)
    pub fn stop_all(&self) -> usize {
        self.stop_all_at(Utc::now())
    }

    /// Returns how many entries were closed; 0 and pointers kept if the save failed
    pub fn stop_all_at(&self, now: DateTime<Utc>) -> usize {
        let _timer = self.store.timer_guard();

        let stopped = format_timestamp(now);
        let mut closed = 0;
        let saved = self.store.modify_time_entries(|entries| {
            for entry in entries.iter_mut().filter(|e| e.is_open()) {
                entry.close(&stopped);
                closed += 1;
            }
            closed > 0
        });

        if closed > 0 && !saved {
            warn!(closed, "Cannot stop timers: closed entries were not saved");
            return 0;
        }

        if !self.store.modify_state(|state| state.clear_timer()) {
            warn!("Timer pointers were not cleared");
        }

        if closed > 0 {
            info!(closed, "Stopped all running timers");
        }
        closed
    }

    /// Append a manually recorded entry.
    ///
    /// A closed entry is simply appended. An open one starts a session: it is
    /// refused while any task is active or any entry is open, and otherwise
    /// sets the same pointers as `start`.
    pub fn record_entry(
        &self,
        task_id: &str,
        start: &str,
        stop: Option<&str>,
        notes: Option<String>,
    ) -> bool {
        let _timer = self.store.timer_guard();

        let entry = TimeEntry::recorded(task_id, start, stop, notes);
        if !entry.is_open() {
            return self.store.modify_time_entries(|entries| {
                entries.push(entry);
                true
            });
        }

        if let Some(active) = self.state.active_task_id() {
            debug!(task_id, active_task_id = %active, "Cannot record open entry: another task is active");
            return false;
        }

        let entry_id = entry.entry_id.clone();
        let started = entry.start_time.clone();
        let saved = self.store.modify_time_entries(|entries| {
            if entries.iter().any(TimeEntry::is_open) {
                return false;
            }
            entries.push(entry);
            true
        });
        if !saved {
            return false;
        }

        self.point_at_running(task_id, &entry_id, &started);
        true
    }

    fn point_at_running(&self, task_id: &str, entry_id: &str, started: &str) {
        let pointers_saved = self.store.modify_state(|state| {
            state.active_task_id = Some(task_id.to_string());
            state.current_time_entry_id = Some(entry_id.to_string());
            state.session_start = Some(started.to_string());
        });
        if !pointers_saved {
            warn!(task_id, entry_id, "Timer started but state pointers were not saved");
        }
    }

    pub fn all_entries(&self) -> Vec<TimeEntry> {
        self.store.load_time_entries()
    }

    pub fn entries_for_task(&self, task_id: &str) -> Vec<TimeEntry> {
        self.store
            .load_time_entries()
            .into_iter()
            .filter(|entry| entry.task_id == task_id)
            .collect()
    }

    /// The first open entry, if any
    pub fn active_entry(&self) -> Option<TimeEntry> {
        self.store.load_time_entries().into_iter().find(TimeEntry::is_open)
    }

    /// Total seconds tracked on a task, counting running sessions live
    pub fn total_time(&self, task_id: &str) -> i64 {
        self.total_time_at(task_id, Utc::now())
    }

    pub fn total_time_at(&self, task_id: &str, now: DateTime<Utc>) -> i64 {
        self.entries_for_task(task_id)
            .iter()
            .map(|entry| entry.duration_at(now))
            .sum()
    }

    /// Live duration of a running session: the given entry, or any open one
    pub fn current_session_duration(&self, entry_id: Option<&str>) -> i64 {
        self.current_session_duration_at(entry_id, Utc::now())
    }

    pub fn current_session_duration_at(&self, entry_id: Option<&str>, now: DateTime<Utc>) -> i64 {
        let entries = self.store.load_time_entries();
        let open = match entry_id {
            Some(id) => entries.iter().find(|e| e.entry_id == id && e.is_open()),
            None => entries.iter().find(|e| e.is_open()),
        };
        open.map(|entry| entry.duration_at(now)).unwrap_or(0)
    }
}
