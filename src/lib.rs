//! taskclock: a personal task timer backed by Todoist.
//!
//! Open tasks are pulled from Todoist into a local JSON cache, and time spent
//! on them is tracked with a single running timer. Everything lives in plain
//! files under the data directory:
//!
//! - `tasks.json`: the task cache, replaced on every sync
//! - `time_tracking.json`: every time entry, open or closed
//! - `state.json`: active task, current entry, session start, last sync
//! - `exports/`: CSV time reports
//!
//! The crate is used by the `taskclock` binary, which offers a CLI and a
//! small HTTP API (see [`api`]) with a background sync loop.

pub mod api;
pub mod config;
pub mod domain;
pub mod manager;
pub mod persistence;
pub mod report;
pub mod sync;
pub mod tracking;
