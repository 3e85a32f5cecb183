pub mod entry;
pub mod state;
pub mod task;

pub use entry::{
    calculate_duration, format_duration, format_timestamp, generate_entry_id, now_iso,
    parse_timestamp, TimeEntry,
};
pub use state::ApplicationState;
pub use task::{sort_newest_completed_first, Task, TaskSummary, DEFAULT_PRIORITY};
