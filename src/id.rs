//! ID and timestamp utilities for actloop
//!
//! Provides identifiers for in-memory tasks and runs, and the capture
//! timestamps used in artifact names.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

/// Artifact timestamp format: `YYYYMMDD_HHMMSS`
pub const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    Local::now().timestamp_millis().max(0) as u64
}

/// Format a capture time for use in an artifact name
pub fn capture_timestamp(at: DateTime<Local>) -> String {
    at.format(CAPTURE_TIMESTAMP_FORMAT).to_string()
}

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Generate a task ID
///
/// Format: `task-{timestamp_ms}-{seq}`
pub fn generate_task_id() -> String {
    format!("task-{}-{}", now_ms(), next_sequence())
}

/// Generate a run ID
///
/// Format: `run-{timestamp_ms}-{seq}`
pub fn generate_run_id() -> String {
    format!("run-{}-{}", now_ms(), next_sequence())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        assert!(ts > 1577836800000); // 2020-01-01
        assert!(ts < 4102444800000); // 2100-01-01
    }

    #[test]
    fn test_capture_timestamp_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(capture_timestamp(at), "20240307_090502");
    }

    #[test]
    fn test_generate_task_id_format() {
        let id = generate_task_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "task");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(generate_run_id()), "Generated duplicate ID");
        }
    }
}
