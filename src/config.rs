//! Configuration management for the file monitor
//!
//! A configuration document is TOML with a single `[file_monitor]` section
//! holding the global settings and an ordered `targets` array. Missing or
//! malformed sections degrade to an empty target list; values that would make
//! the monitor misbehave (non-positive intervals, hours outside the day) are
//! rejected with a [`ConfigError`].

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::TimeWindow;
use crate::error::ConfigError;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAX_FILES_PER_CHECK: usize = 1000;
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;
pub const DEFAULT_PATTERN: &str = "*";

/// Name of the configuration section and of the report section
pub const SECTION_NAME: &str = "file_monitor";

/// Global monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Minimum time between two passes
    pub check_interval: Duration,
    /// Hours of the day during which scans run
    pub time_range: Option<TimeWindow>,
    /// Soft cap on matches processed in one pass
    pub max_files_per_check: usize,
    /// Number of notification lines kept in memory
    pub history_limit: usize,
    /// Monitored targets, in report order
    pub targets: Vec<TargetConfig>,
}

/// One monitored file or directory
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub path: PathBuf,
    pub is_directory: bool,
    /// Walk the full subtree; only meaningful for directories
    pub recursive: bool,
    /// Glob applied to the file name of each candidate
    pub pattern: String,
    pub exclude_patterns: Vec<String>,
    pub delete_after_found: bool,
    /// Entries smaller than this many bytes are skipped
    pub min_size: Option<u64>,
    /// Entries modified more recently than this are skipped
    pub min_age: Option<Duration>,
    /// Per-target override of the global check interval
    pub check_interval: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            time_range: None,
            max_files_per_check: DEFAULT_MAX_FILES_PER_CHECK,
            history_limit: DEFAULT_HISTORY_LIMIT,
            targets: Vec::new(),
        }
    }
}

impl TargetConfig {
    /// Monitor a single file
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            recursive: false,
            pattern: DEFAULT_PATTERN.to_string(),
            exclude_patterns: Vec::new(),
            delete_after_found: false,
            min_size: None,
            min_age: None,
            check_interval: None,
        }
    }

    /// Monitor the direct children of a directory
    pub fn directory<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            is_directory: true,
            ..Self::file(path)
        }
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = pattern.to_string();
        self
    }

    pub fn with_excludes(mut self, patterns: &[&str]) -> Self {
        self.exclude_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn deleting(mut self) -> Self {
        self.delete_after_found = true;
        self
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = Some(bytes);
        self
    }

    pub fn with_min_age(mut self, age: Duration) -> Self {
        self.min_age = Some(age);
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// The interval gating this target, falling back to the global one
    pub fn effective_interval(&self, global: Duration) -> Duration {
        self.check_interval.unwrap_or(global)
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    file_monitor: Option<toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSection {
    check_interval: Option<i64>,
    time_range: Option<Vec<i64>>,
    max_files_per_check: Option<i64>,
    history_limit: Option<i64>,
    #[serde(alias = "paths")]
    targets: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    path: String,
    #[serde(default)]
    is_directory: bool,
    #[serde(default)]
    recursive: bool,
    #[serde(default = "default_pattern")]
    pattern: String,
    #[serde(default)]
    exclude_patterns: Vec<String>,
    #[serde(default, alias = "delete")]
    delete_after_found: bool,
    min_size: Option<u64>,
    min_age: Option<u64>,
    check_interval: Option<i64>,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn positive_seconds(value: i64) -> Option<Duration> {
    u64::try_from(value)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn positive_count(value: i64, field: &'static str) -> Result<usize, ConfigError> {
    usize::try_from(value)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(ConfigError::ZeroLimit { field })
}

fn parse_time_range(hours: &[i64]) -> Result<TimeWindow, ConfigError> {
    if hours.len() != 2 {
        return Err(ConfigError::MalformedTimeRange(hours.len()));
    }
    let hour = |h: i64| {
        u8::try_from(h)
            .ok()
            .filter(|h| *h <= 23)
            .ok_or(ConfigError::HourOutOfRange(h))
    };
    Ok(TimeWindow::new(hour(hours[0])?, hour(hours[1])?))
}

impl RawTarget {
    fn into_target(self) -> Result<Option<TargetConfig>, ConfigError> {
        if self.path.trim().is_empty() {
            warn!("Skipping file monitor target with an empty path");
            return Ok(None);
        }
        let check_interval = match self.check_interval {
            Some(value) => Some(positive_seconds(value).ok_or_else(|| {
                ConfigError::NonPositiveTargetInterval {
                    path: self.path.clone(),
                    value,
                }
            })?),
            None => None,
        };

        Ok(Some(TargetConfig {
            path: PathBuf::from(self.path),
            is_directory: self.is_directory,
            recursive: self.recursive,
            pattern: self.pattern,
            exclude_patterns: self.exclude_patterns,
            delete_after_found: self.delete_after_found,
            min_size: self.min_size,
            min_age: self.min_age.map(Duration::from_secs),
            check_interval,
        }))
    }
}

/// Configuration loading and management
impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let document: RawDocument = toml::from_str(text)?;
        let mut config = Self::default();

        let section = match document.file_monitor {
            Some(toml::Value::Table(table)) => table,
            Some(_) => {
                warn!("'{}' section is malformed, monitoring nothing", SECTION_NAME);
                return Ok(config);
            }
            None => {
                warn!("'{}' section absent, monitoring nothing", SECTION_NAME);
                return Ok(config);
            }
        };
        let section: RawSection = toml::Value::Table(section).try_into()?;

        if let Some(value) = section.check_interval {
            config.check_interval =
                positive_seconds(value).ok_or(ConfigError::NonPositiveInterval(value))?;
        }
        if let Some(hours) = section.time_range.as_deref() {
            config.time_range = Some(parse_time_range(hours)?);
        }
        if let Some(value) = section.max_files_per_check {
            config.max_files_per_check = positive_count(value, "max_files_per_check")?;
        }
        if let Some(value) = section.history_limit {
            config.history_limit = positive_count(value, "history_limit")?;
        }

        match section.targets {
            Some(toml::Value::Array(items)) => {
                for (index, item) in items.into_iter().enumerate() {
                    match item.try_into::<RawTarget>() {
                        Ok(raw) => {
                            if let Some(target) = raw.into_target()? {
                                debug!(
                                    "Added monitoring target '{}' with delete={}",
                                    target.path.display(),
                                    target.delete_after_found
                                );
                                config.targets.push(target);
                            }
                        }
                        Err(err) => {
                            warn!("Skipping file monitor target #{}: {}", index, err);
                        }
                    }
                }
            }
            Some(_) => warn!("'{}.targets' is not a list, monitoring nothing", SECTION_NAME),
            None => warn!("'{}.targets' absent, monitoring nothing", SECTION_NAME),
        }

        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FILEMON_CHECK_INTERVAL") {
            if let Ok(secs) = val.parse::<u64>() {
                self.check_interval = Duration::from_secs(secs);
            }
        }

        if let Ok(val) = std::env::var("FILEMON_MAX_FILES_PER_CHECK") {
            if let Ok(max) = val.parse::<usize>() {
                self.max_files_per_check = max;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval.is_zero() {
            return Err(ConfigError::NonPositiveInterval(0));
        }

        if let Some(window) = self.time_range {
            for hour in [window.start, window.end] {
                if hour > 23 {
                    return Err(ConfigError::HourOutOfRange(i64::from(hour)));
                }
            }
        }

        if self.max_files_per_check == 0 {
            return Err(ConfigError::ZeroLimit { field: "max_files_per_check" });
        }

        if self.history_limit == 0 {
            return Err(ConfigError::ZeroLimit { field: "history_limit" });
        }

        for target in &self.targets {
            if target.check_interval.is_some_and(|i| i.is_zero()) {
                return Err(ConfigError::NonPositiveTargetInterval {
                    path: target.path.display().to_string(),
                    value: 0,
                });
            }
        }

        Ok(())
    }
}
