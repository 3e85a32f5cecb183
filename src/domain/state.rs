use serde::{Deserialize, Serialize};

/// Pointers describing the current work session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    #[serde(default)]
    pub active_task_id: Option<String>,
    #[serde(default)]
    pub current_time_entry_id: Option<String>,
    /// Start of the running session; set on start, cleared on stop
    #[serde(default)]
    pub session_start: Option<String>,
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl ApplicationState {
    /// Forget the running task and its entry
    pub fn clear_timer(&mut self) {
        self.active_task_id = None;
        self.current_time_entry_id = None;
        self.session_start = None;
    }
}
