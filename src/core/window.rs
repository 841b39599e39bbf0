//! Hour-of-day windows restricting when scans run

use serde::{Deserialize, Serialize};

/// An inclusive hour range. When `start > end` the window wraps past
/// midnight: `start..=23` followed by `0..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: u8,
    pub end: u8,
}

impl TimeWindow {
    /// Callers validate hours at load time; see `MonitorConfig::validate`.
    pub fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        if start <= end {
            start <= hour && hour <= end
        } else {
            hour >= start || hour <= end
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:59", self.start, self.end)
    }
}

/// Whether `now_hour` is inside `window`; no window means always allowed
pub fn allowed(now_hour: u32, window: Option<TimeWindow>) -> bool {
    window.map_or(true, |w| w.contains(now_hour))
}
