use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Milliseconds since epoch of a file timestamp, 0 before the epoch
pub(crate) fn system_time_millis(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}
