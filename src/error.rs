//! Error types for configuration loading, scanning and deletion

use std::path::PathBuf;
use thiserror::Error;

/// Errors that make a configuration unusable. The engine stays in its
/// previous state when one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("check_interval must be a positive number of seconds, got {0}")]
    NonPositiveInterval(i64),
    #[error("check_interval for target {path} must be a positive number of seconds, got {value}")]
    NonPositiveTargetInterval { path: String, value: i64 },
    #[error("time_range hour {0} is outside 0..=23")]
    HourOutOfRange(i64),
    #[error("time_range must contain exactly two hours, got {0}")]
    MalformedTimeRange(usize),
    #[error("{field} must be greater than 0")]
    ZeroLimit { field: &'static str },
}

/// A glob pattern that cannot be used for matching
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("pattern {pattern:?} is longer than {max} characters")]
    TooLong { pattern: String, max: usize },
    #[error("pattern {pattern:?} contains a path separator; patterns apply to file names only")]
    PathSeparator { pattern: String },
    #[error("pattern {pattern:?} contains a NUL character")]
    Nul { pattern: String },
}

/// A failure while enumerating a target; the affected subtree is abandoned
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read {path}: {reason}")]
    Walk { path: PathBuf, reason: String },
    #[error("cannot stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),
}

/// Why a matched entry was not removed
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("{0} no longer exists")]
    Vanished(PathBuf),
    #[error("cannot delete {path}: {reason}")]
    Failed { path: PathBuf, reason: String },
}
