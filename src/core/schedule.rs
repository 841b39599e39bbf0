//! Interval gating between checks

use chrono::{DateTime, Local};
use std::time::Duration;

/// True when at least `interval` has passed between `last_check` and `now`.
///
/// A clock that moved backwards yields a negative elapsed time, which is
/// never due until the wall clock catches up again.
pub fn is_due(last_check: DateTime<Local>, interval: Duration, now: DateTime<Local>) -> bool {
    match (now - last_check).to_std() {
        Ok(elapsed) => elapsed >= interval,
        Err(_) => false,
    }
}

/// Like [`is_due`], treating a target that was never checked as due
pub fn is_due_since(last_check: Option<DateTime<Local>>, interval: Duration, now: DateTime<Local>) -> bool {
    last_check.map_or(true, |last| is_due(last, interval, now))
}
