use crate::domain::{format_duration, Task, TimeEntry};
use crate::persistence::{atomic_write, Store};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Column order of the exported time report
pub const REPORT_COLUMNS: [&str; 8] = [
    "task_id",
    "task_content",
    "entry_id",
    "start_time",
    "stop_time",
    "duration_seconds",
    "duration_human",
    "notes",
];

/// Written in the stop column while a session is still running
pub const ACTIVE_MARKER: &str = "ACTIVE";

/// One line of the time report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub task_id: String,
    pub task_content: String,
    pub entry_id: String,
    pub start_time: String,
    pub stop_time: String,
    pub duration_seconds: i64,
    pub duration_human: String,
    pub notes: String,
}

impl ReportRow {
    fn fields(&self) -> [Cow<'_, str>; 8] {
        [
            Cow::Borrowed(self.task_id.as_str()),
            Cow::Borrowed(self.task_content.as_str()),
            Cow::Borrowed(self.entry_id.as_str()),
            Cow::Borrowed(self.start_time.as_str()),
            Cow::Borrowed(self.stop_time.as_str()),
            Cow::Owned(self.duration_seconds.to_string()),
            Cow::Borrowed(self.duration_human.as_str()),
            Cow::Borrowed(self.notes.as_str()),
        ]
    }
}

/// Build report rows, optionally restricted to one task.
///
/// Task content is joined from the task cache and left empty when the task
/// has since disappeared. Running sessions are measured up to `now`.
pub fn build_rows(
    entries: &[TimeEntry],
    tasks: &[Task],
    task_filter: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<ReportRow> {
    let contents: HashMap<&str, &str> = tasks
        .iter()
        .map(|task| (task.id.as_str(), task.content.as_str()))
        .collect();

    entries
        .iter()
        .filter(|entry| task_filter.map_or(true, |id| entry.task_id == id))
        .map(|entry| {
            let duration = entry.duration_at(now);
            ReportRow {
                task_id: entry.task_id.clone(),
                task_content: contents
                    .get(entry.task_id.as_str())
                    .map(|content| content.to_string())
                    .unwrap_or_default(),
                entry_id: entry.entry_id.clone(),
                start_time: entry.start_time.clone(),
                stop_time: entry
                    .stop_time
                    .clone()
                    .unwrap_or_else(|| ACTIVE_MARKER.to_string()),
                duration_seconds: duration,
                duration_human: format_duration(duration),
                notes: entry.notes.clone().unwrap_or_default(),
            }
        })
        .collect()
}

/// Quote a field when it contains a delimiter, quote, or line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn push_record<S: AsRef<str>>(out: &mut String, fields: impl IntoIterator<Item = S>) {
    let line: Vec<String> = fields
        .into_iter()
        .map(|field| escape_field(field.as_ref()).into_owned())
        .collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Render rows as CSV, header first (a header-only report when there are no rows)
pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    push_record(&mut out, REPORT_COLUMNS);
    for row in rows {
        push_record(&mut out, row.fields());
    }
    out
}

/// Default file name for a report
pub fn default_report_name(task_filter: Option<&str>) -> String {
    match task_filter {
        Some(task_id) => format!("time_report_{}.csv", task_id),
        None => "time_report.csv".to_string(),
    }
}

/// Export the time report to CSV.
///
/// Writes to `output_path`, or to `<data dir>/exports/` when not given.
pub fn generate_report(
    store: &Store,
    task_filter: Option<&str>,
    output_path: Option<PathBuf>,
) -> Result<PathBuf> {
    let task_filter = task_filter.filter(|id| !id.is_empty());

    let entries = store.load_time_entries();
    let tasks = store.load_tasks();
    let rows = build_rows(&entries, &tasks, task_filter, Utc::now());

    let output = match output_path {
        Some(path) => path,
        None => store.exports_dir()?.join(default_report_name(task_filter)),
    };

    atomic_write(&output, &render_csv(&rows))
        .with_context(|| format!("Failed to write time report: {}", output.display()))?;

    info!(path = %output.display(), rows = rows.len(), "Time report exported");
    Ok(output)
}
