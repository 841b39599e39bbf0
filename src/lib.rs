//! Poll-based file presence monitoring
//!
//! A [`MonitorEngine`] periodically scans configured files and directories,
//! matches entries against glob rules, optionally deletes what it finds and
//! keeps a text report of the most recent pass.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub use config::{MonitorConfig, TargetConfig};
pub use self::core::{
    EngineState, EventKind, Level, MatchedEntry, MonitorEngine, NotificationSink, RefreshOutcome, Remover,
    ScanResult, StatusCode, TargetReport, TargetStatus, TimeWindow,
};
pub use error::{ConfigError, DeleteError, PatternError, ScanError};
