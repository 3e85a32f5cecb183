use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for locally generated time entry IDs
const ENTRY_ID_PREFIX: &str = "time-";

/// Number of hex characters kept from the UUID
const ENTRY_ID_HEX_LEN: usize = 12;

/// One contiguous work session on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    #[serde(default)]
    pub entry_id: String,
    /// Weak reference to `Task::id`, never validated against the task cache
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub start_time: String,
    /// `None` while the session is running
    #[serde(default)]
    pub stop_time: Option<String>,
    /// Only meaningful once `stop_time` is set
    #[serde(default)]
    pub duration_seconds: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TimeEntry {
    /// Create a running entry starting at `start_time`
    pub fn open(task_id: &str, start_time: &str) -> Self {
        Self {
            entry_id: generate_entry_id(),
            task_id: task_id.to_string(),
            start_time: start_time.to_string(),
            stop_time: None,
            duration_seconds: 0,
            notes: None,
        }
    }

    /// Create an entry with explicit bounds (manual recording)
    pub fn recorded(task_id: &str, start_time: &str, stop_time: Option<&str>, notes: Option<String>) -> Self {
        let mut entry = Self::open(task_id, start_time);
        entry.notes = notes;
        if let Some(stop) = stop_time {
            entry.close(stop);
        }
        entry
    }

    pub fn is_open(&self) -> bool {
        self.stop_time.is_none()
    }

    /// Stop the session and freeze its duration
    pub fn close(&mut self, stop_time: &str) {
        self.duration_seconds = calculate_duration(&self.start_time, stop_time);
        self.stop_time = Some(stop_time.to_string());
    }

    /// Duration in whole seconds as of `now`.
    ///
    /// Closed entries report the frozen value. Open entries are always
    /// computed live from `start_time`; the stored placeholder is ignored.
    pub fn duration_at(&self, now: DateTime<Utc>) -> i64 {
        if self.stop_time.is_some() {
            return self.duration_seconds;
        }
        match parse_timestamp(&self.start_time) {
            Some(start) => now.signed_duration_since(start).num_seconds(),
            None => 0,
        }
    }
}

/// Generate a unique time entry ID such as `time-1a2b3c4d5e6f`
pub fn generate_entry_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", ENTRY_ID_PREFIX, &hex[..ENTRY_ID_HEX_LEN])
}

/// Format a timestamp the way every persisted record stores it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current UTC time as an ISO-8601 string
pub fn now_iso() -> String {
    format_timestamp(Utc::now())
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Seconds between two timestamps, truncated toward zero (0 if either is malformed)
pub fn calculate_duration(start: &str, stop: &str) -> i64 {
    match (parse_timestamp(start), parse_timestamp(stop)) {
        (Some(start), Some(stop)) => stop.signed_duration_since(start).num_seconds(),
        _ => 0,
    }
}

/// Format seconds as "Xh Ym" / "Ym Zs" (omits 0 values, seconds only below an hour)
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0m".to_string();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let remaining_seconds = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if remaining_seconds > 0 && hours == 0 {
        parts.push(format!("{}s", remaining_seconds));
    }

    if parts.is_empty() {
        "0m".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(value: &str) -> DateTime<Utc> {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_generate_entry_id_shape() {
        let id = generate_entry_id();
        assert!(id.starts_with("time-"));
        assert_eq!(id.len(), 5 + 12);
        assert_ne!(id, generate_entry_id());
    }

    #[test]
    fn test_calculate_duration() {
        assert_eq!(calculate_duration("2024-01-01T00:00:00Z", "2024-01-01T00:05:30Z"), 330);
        // Fractional seconds truncate
        assert_eq!(
            calculate_duration("2024-01-01T00:00:00.000000Z", "2024-01-01T00:00:01.999999Z"),
            1
        );
        // Naive timestamps are read as UTC
        assert_eq!(calculate_duration("2024-01-01T00:00:00", "2024-01-01T01:00:00Z"), 3600);
    }

    #[test]
    fn test_calculate_duration_malformed_is_zero() {
        assert_eq!(calculate_duration("not a time", "2024-01-01T00:05:30Z"), 0);
        assert_eq!(calculate_duration("2024-01-01T00:00:00Z", ""), 0);
    }

    #[test]
    fn test_open_entry_duration_is_live() {
        let mut entry = TimeEntry::open("t1", "2024-01-01T00:00:00.000000Z");
        // A stale placeholder must never be trusted
        entry.duration_seconds = 9999;

        assert_eq!(entry.duration_at(at("2024-01-01T00:01:00Z")), 60);
        assert_eq!(entry.duration_at(at("2024-01-01T00:02:00Z")), 120);
    }

    #[test]
    fn test_closed_entry_duration_is_frozen() {
        let mut entry = TimeEntry::open("t1", "2024-01-01T00:00:00Z");
        entry.close("2024-01-01T00:05:30Z");

        assert!(!entry.is_open());
        assert_eq!(entry.duration_seconds, 330);
        assert_eq!(entry.duration_at(at("2030-01-01T00:00:00Z")), 330);
    }

    #[test]
    fn test_open_entry_with_malformed_start() {
        let entry = TimeEntry::open("t1", "garbage");
        assert_eq!(entry.duration_at(Utc::now()), 0);
    }

    #[test]
    fn test_recorded_entry() {
        let entry = TimeEntry::recorded(
            "t1",
            "2024-01-01T09:00:00Z",
            Some("2024-01-01T10:30:00Z"),
            Some("pairing".to_string()),
        );
        assert_eq!(entry.duration_seconds, 5400);
        assert_eq!(entry.notes.as_deref(), Some("pairing"));
    }

    #[test]
    fn test_format_timestamp_roundtrips_through_parse() {
        let now = at("2024-03-05T06:07:08.123456Z");
        let formatted = format_timestamp(now);
        assert_eq!(formatted, "2024-03-05T06:07:08.123456Z");
        assert_eq!(parse_timestamp(&formatted), Some(now));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(330), "5m 30s");
        assert_eq!(format_duration(300), "5m");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(3900), "1h 5m");
        // Seconds are dropped once there is an hour component
        assert_eq!(format_duration(3930), "1h 5m");
        assert_eq!(format_duration(3601), "1h");
        assert_eq!(format_duration(-5), "0m");
    }
}
