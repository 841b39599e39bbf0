//! Per-pass results and the text report built from them

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::SECTION_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Found,
    NotFound,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Found => "found",
            TargetStatus::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    WillDelete,
    Keep,
}

impl TargetAction {
    pub fn from_delete_flag(delete_after_found: bool) -> Self {
        if delete_after_found {
            TargetAction::WillDelete
        } else {
            TargetAction::Keep
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetAction::WillDelete => "will_delete",
            TargetAction::Keep => "keep",
        }
    }
}

/// Outcome of one target within a pass
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub path: PathBuf,
    pub status: TargetStatus,
    pub action: TargetAction,
    /// False when the target was not due this pass; `status` then carries
    /// the outcome of its most recent scan
    pub scanned: bool,
    pub found: usize,
    pub deleted: usize,
    pub not_deleted: usize,
    pub errors: Vec<String>,
}

impl TargetReport {
    pub fn new(path: PathBuf, action: TargetAction) -> Self {
        Self {
            path,
            status: TargetStatus::NotFound,
            action,
            scanned: false,
            found: 0,
            deleted: 0,
            not_deleted: 0,
            errors: Vec::new(),
        }
    }
}

/// Everything one pass produced
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    #[serde(with = "duration_secs")]
    pub check_interval: Duration,
    pub targets: Vec<TargetReport>,
    /// Structured event lines emitted during the pass, in order
    pub events: Vec<String>,
    /// True when `max_files_per_check` cut the pass short
    pub truncated: bool,
}

impl ScanResult {
    pub fn files_found(&self) -> usize {
        self.targets.iter().map(|t| t.found).sum()
    }

    pub fn files_deleted(&self) -> usize {
        self.targets.iter().map(|t| t.deleted).sum()
    }

    /// Every error of the pass, prefixed with its target
    pub fn errors(&self) -> Vec<String> {
        self.targets
            .iter()
            .flat_map(|t| {
                t.errors
                    .iter()
                    .map(move |e| format!("{}: {}", t.path.display(), e))
            })
            .collect()
    }

    /// Render the section text read by `MonitorEngine::current_report`
    pub fn render(&self) -> String {
        let mut output = section_header(SECTION_NAME);
        let _ = writeln!(output, "CheckInterval: {} seconds", self.check_interval.as_secs());
        let _ = writeln!(output, "Targets: {}", self.targets.len());
        for target in &self.targets {
            let _ = writeln!(
                output,
                "{}|{}|{}",
                target.path.display(),
                target.status.as_str(),
                target.action.as_str()
            );
        }
        let _ = writeln!(
            output,
            "Found: {} Deleted: {} Errors: {}{}",
            self.files_found(),
            self.files_deleted(),
            self.errors().len(),
            if self.truncated { " (truncated)" } else { "" }
        );
        for event in &self.events {
            output.push_str(event);
            output.push('\n');
        }
        output
    }
}

/// Section marker line that opens a report
pub fn section_header(name: &str) -> String {
    format!("<<<{}>>>\n", name)
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}
