pub mod state;
pub mod timer;

pub use state::TaskState;
pub use timer::TimeTracker;
