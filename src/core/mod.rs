//! Core functionality module
//!
//! Contains pattern matching, scheduling, scanning, deletion, notification
//! and the engine that ties them together

pub mod pattern;
pub mod window;
pub mod schedule;
pub mod scanner;
pub mod delete;
pub mod events;
pub mod sink;
pub mod summary;
pub mod engine;

// Re-export main types
pub use pattern::{matches, Pattern, PatternSet};
pub use window::{allowed, TimeWindow};
pub use schedule::{is_due, is_due_since};
pub use scanner::{scan, MatchedEntry, ScanItem, TargetScanner};
pub use delete::{delete, Remover};
pub use events::{EventKind, Level, StatusCode};
pub use sink::NotificationSink;
pub use summary::{ScanResult, TargetAction, TargetReport, TargetStatus};
pub use engine::{EngineState, MonitorEngine, RefreshOutcome};
