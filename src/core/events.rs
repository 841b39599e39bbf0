use std::fmt;
use serde::{Deserialize, Serialize};

/// Severity of a human-readable notification line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leading code of a structured status line, as read by monitoring pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusCode {
    Ok = 0,
    Warning = 1,
    Critical = 2,
}

impl StatusCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Notable occurrences reported on the structured event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    FileFound,
    FileDeleted,
    DeleteFailed,
    NoFilesFound,
    ScanError,
    Summary,
}

impl EventKind {
    /// Suffix used after `FileMonitor_` in structured lines
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FileFound => "file_found",
            EventKind::FileDeleted => "file_deleted",
            EventKind::DeleteFailed => "delete_failed",
            EventKind::NoFilesFound => "no_files_found",
            EventKind::ScanError => "scan_error",
            EventKind::Summary => "summary",
        }
    }

    /// Status policy: deletions warn, quiet outcomes are ok, the rest is critical
    pub fn status(&self) -> StatusCode {
        match self {
            EventKind::FileDeleted => StatusCode::Warning,
            EventKind::NoFilesFound | EventKind::Summary => StatusCode::Ok,
            EventKind::FileFound
            | EventKind::DeleteFailed
            | EventKind::ScanError => StatusCode::Critical,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
