//! The monitor engine: owns the configuration and check bookkeeping, runs
//! passes over all due targets and keeps the most recent report.
//!
//! Two locks are involved. `pass` serializes passes and configuration
//! reloads; it is held for the whole duration of file-system work. `shared`
//! guards the bookkeeping and the report and is only held for short,
//! I/O-free sections, so readers of the report never wait on a slow walk.
//! Lock order is always `pass` before `shared`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use chrono::{DateTime, Local, Timelike};
use serde::Serialize;
use tracing::{debug, info};

use super::delete::{delete, Remover};
use super::events::{EventKind, Level};
use super::scanner::{scan, ScanItem};
use super::schedule::is_due_since;
use super::sink::NotificationSink;
use super::summary::{ScanResult, TargetAction, TargetReport, TargetStatus};
use super::window;
use crate::config::{MonitorConfig, TargetConfig};
use crate::error::{ConfigError, DeleteError, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Scanning,
}

/// What a call to [`MonitorEngine::refresh`] did
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(ScanResult),
    /// The global interval has not elapsed; the previous report stands
    NotDue,
    /// The current hour is outside the configured time range
    OutsideTimeWindow,
    /// No configuration has been loaded yet
    NotReady,
}

impl RefreshOutcome {
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            RefreshOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct TargetState {
    path: PathBuf,
    last_check: Option<DateTime<Local>>,
    last_status: TargetStatus,
}

#[derive(Debug)]
struct Shared {
    state: EngineState,
    config: Option<Arc<MonitorConfig>>,
    targets: Vec<TargetState>,
    last_check: Option<DateTime<Local>>,
    report: String,
    last_result: Option<ScanResult>,
}

pub struct MonitorEngine {
    pass: Mutex<()>,
    shared: Mutex<Shared>,
    sink: NotificationSink,
    remover: Remover,
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("shared", &self.shared)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl Default for MonitorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorEngine {
    /// Create an engine with no configuration
    pub fn new() -> Self {
        Self {
            pass: Mutex::new(()),
            shared: Mutex::new(Shared {
                state: EngineState::Uninitialized,
                config: None,
                targets: Vec::new(),
                last_check: None,
                report: String::new(),
                last_result: None,
            }),
            sink: NotificationSink::default(),
            remover: delete,
        }
    }

    /// Use `remover` instead of [`delete`] for matched files
    pub fn with_remover(mut self, remover: Remover) -> Self {
        self.remover = remover;
        self
    }

    /// Create an engine and load `config` into it
    pub fn with_config(config: MonitorConfig) -> Result<Self, ConfigError> {
        let engine = Self::new();
        engine.load_config(config)?;
        Ok(engine)
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pass(&self) -> MutexGuard<'_, ()> {
        self.pass.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a configuration. On error the engine keeps whatever it had
    /// before: an uninitialized engine stays uninitialized, a ready engine
    /// keeps its previous configuration.
    ///
    /// Targets whose path is unchanged keep their check bookkeeping.
    pub fn load_config(&self, config: MonitorConfig) -> Result<(), ConfigError> {
        if let Err(err) = config.validate() {
            self.sink
                .record(&format!("Rejected file monitor configuration: {}", err), Level::Error);
            return Err(err);
        }

        let _pass = self.lock_pass();
        let mut shared = self.shared();

        let previous = std::mem::take(&mut shared.targets);
        shared.targets = config
            .targets
            .iter()
            .map(|target| {
                let carried = previous.iter().find(|old| old.path == target.path);
                TargetState {
                    path: target.path.clone(),
                    last_check: carried.and_then(|old| old.last_check),
                    last_status: carried.map_or(TargetStatus::NotFound, |old| old.last_status),
                }
            })
            .collect();

        self.sink.set_capacity(config.history_limit);
        self.sink.record(
            &format!(
                "Loaded file monitor configuration: {} targets, check interval {} seconds",
                config.targets.len(),
                config.check_interval.as_secs()
            ),
            Level::Info,
        );

        shared.config = Some(Arc::new(config));
        shared.state = EngineState::Ready;
        Ok(())
    }

    /// Read and install a TOML configuration file
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = MonitorConfig::load(path.as_ref()).map_err(|err| {
            self.sink.record(
                &format!("Failed to load {}: {}", path.as_ref().display(), err),
                Level::Error,
            );
            err
        })?;
        self.load_config(config)
    }

    pub fn state(&self) -> EngineState {
        self.shared().state
    }

    pub fn config(&self) -> Option<Arc<MonitorConfig>> {
        self.shared().config.clone()
    }

    /// When the last pass ran
    pub fn last_check(&self) -> Option<DateTime<Local>> {
        self.shared().last_check
    }

    /// Last scan time of each target, in configuration order
    pub fn target_last_checks(&self) -> Vec<(PathBuf, Option<DateTime<Local>>)> {
        self.shared()
            .targets
            .iter()
            .map(|t| (t.path.clone(), t.last_check))
            .collect()
    }

    /// Run a pass if one is due, using the local wall clock
    pub fn refresh(&self) -> RefreshOutcome {
        self.refresh_at(Local::now())
    }

    /// Run a pass if one is due at `now`
    pub fn refresh_at(&self, now: DateTime<Local>) -> RefreshOutcome {
        let _pass = self.lock_pass();

        let (config, due) = {
            let mut shared = self.shared();
            let Some(config) = shared.config.clone() else {
                debug!("Refresh requested before configuration was loaded");
                return RefreshOutcome::NotReady;
            };
            if !is_due_since(shared.last_check, config.check_interval, now) {
                debug!("Check interval has not elapsed, keeping previous report");
                return RefreshOutcome::NotDue;
            }
            if !window::allowed(now.hour(), config.time_range) {
                debug!("Hour {} is outside the monitoring window", now.hour());
                return RefreshOutcome::OutsideTimeWindow;
            }

            let due: Vec<bool> = config
                .targets
                .iter()
                .zip(&shared.targets)
                .map(|(target, state)| {
                    is_due_since(
                        state.last_check,
                        target.effective_interval(config.check_interval),
                        now,
                    )
                })
                .collect();
            shared.state = EngineState::Scanning;
            (config, due)
        };

        let mut budget = config.max_files_per_check;
        let mut truncated = false;
        let mut events = Vec::new();
        let mut reports = Vec::with_capacity(config.targets.len());

        for (target, is_due) in config.targets.iter().zip(due) {
            let mut report = TargetReport::new(
                target.path.clone(),
                TargetAction::from_delete_flag(target.delete_after_found),
            );
            if is_due && budget == 0 {
                truncated = true;
                debug!("Scan cap reached, skipping {}", target.path.display());
            } else if is_due {
                report.scanned = true;
                truncated |= self.scan_target(target, &config, now, &mut budget, &mut report, &mut events);
            }
            reports.push(report);
        }

        let found: usize = reports.iter().map(|r| r.found).sum();
        let deleted: usize = reports.iter().map(|r| r.deleted).sum();
        let errors: usize = reports.iter().map(|r| r.errors.len()).sum();
        events.push(self.sink.emit_structured_event(
            EventKind::Summary,
            "*",
            &format!(
                "targets={} found={} deleted={} errors={}",
                reports.len(),
                found,
                deleted,
                errors
            ),
        ));

        let mut shared = self.shared();
        for (report, state) in reports.iter_mut().zip(shared.targets.iter_mut()) {
            if report.scanned {
                state.last_check = Some(now);
                state.last_status = report.status;
            } else {
                report.status = state.last_status;
            }
        }

        let result = ScanResult {
            started_at: now,
            finished_at: Local::now(),
            check_interval: config.check_interval,
            targets: reports,
            events,
            truncated,
        };
        info!(
            "File monitor pass finished: {} found, {} deleted, {} errors",
            found, deleted, errors
        );

        shared.last_check = Some(now);
        shared.report = result.render();
        shared.last_result = Some(result.clone());
        shared.state = EngineState::Ready;
        RefreshOutcome::Completed(result)
    }

    /// Scan one target, delete what needs deleting and fill in `report`.
    /// Returns true when a match was left unreported because the budget ran
    /// out during this target.
    fn scan_target(
        &self,
        target: &TargetConfig,
        config: &MonitorConfig,
        now: DateTime<Local>,
        budget: &mut usize,
        report: &mut TargetReport,
        events: &mut Vec<String>,
    ) -> bool {
        let subject = target.path.display().to_string();

        let mut scanner = match scan(target, config, now) {
            Ok(scanner) => scanner.with_limit(*budget),
            Err(err) => {
                let err = ScanError::from(err);
                self.sink
                    .record(&format!("Skipping '{}': {}", subject, err), Level::Error);
                events.push(self.sink.emit_structured_event(
                    EventKind::ScanError,
                    &subject,
                    &err.to_string(),
                ));
                report.errors.push(err.to_string());
                return false;
            }
        };

        let mut missing = false;
        for item in scanner.by_ref() {
            match item {
                ScanItem::Missing => {
                    missing = true;
                    self.sink
                        .record(&format!("Target '{}' not found", subject), Level::Info);
                }
                ScanItem::Matched(entry) => {
                    *budget = budget.saturating_sub(1);
                    report.found += 1;
                    let path = entry.path.display().to_string();
                    self.sink
                        .record(&format!("File '{}' found", path), Level::Info);
                    events.push(self.sink.emit_structured_event(
                        EventKind::FileFound,
                        &path,
                        &format!("found ({} bytes)", entry.size),
                    ));

                    if target.delete_after_found {
                        self.delete_entry(&entry.path, report, events);
                    }
                }
                ScanItem::Failed(err) => {
                    self.sink.record(
                        &format!("Error checking '{}': {}", subject, err),
                        Level::Error,
                    );
                    events.push(self.sink.emit_structured_event(
                        EventKind::ScanError,
                        &subject,
                        &err.to_string(),
                    ));
                    report.errors.push(err.to_string());
                }
            }
        }

        if report.found > 0 {
            report.status = TargetStatus::Found;
        } else {
            report.status = TargetStatus::NotFound;
            let message = if missing {
                "path does not exist"
            } else {
                "no matching files"
            };
            events.push(self.sink.emit_structured_event(
                EventKind::NoFilesFound,
                &subject,
                message,
            ));
        }

        scanner.truncated()
    }

    fn delete_entry(&self, path: &Path, report: &mut TargetReport, events: &mut Vec<String>) {
        let display = path.display().to_string();
        match (self.remover)(path) {
            Ok(()) => {
                report.deleted += 1;
                self.sink.record(
                    &format!("File '{}' was successfully deleted", display),
                    Level::Info,
                );
                events.push(self.sink.emit_structured_event(
                    EventKind::FileDeleted,
                    &display,
                    "deleted",
                ));
            }
            Err(err @ DeleteError::Vanished(_)) => {
                report.not_deleted += 1;
                self.sink
                    .record(&format!("Not deleted: {}", err), Level::Info);
            }
            Err(err @ DeleteError::Failed { .. }) => {
                report.not_deleted += 1;
                self.sink.record(&err.to_string(), Level::Warn);
                events.push(self.sink.emit_structured_event(
                    EventKind::DeleteFailed,
                    &display,
                    &err.to_string(),
                ));
                report.errors.push(err.to_string());
            }
        }
    }

    /// The report of the most recent pass; empty before the first one
    pub fn current_report(&self) -> String {
        self.shared().report.clone()
    }

    /// Section body for agent-style callers; same as [`Self::current_report`]
    pub fn make_body(&self) -> String {
        self.current_report()
    }

    pub fn last_result(&self) -> Option<ScanResult> {
        self.shared().last_result.clone()
    }

    /// Bounded history of timestamped notification lines
    pub fn notifications(&self) -> Vec<String> {
        self.sink.notifications()
    }

    /// Bounded history of structured status lines
    pub fn structured_events(&self) -> Vec<String> {
        self.sink.structured_events()
    }

    pub fn sink(&self) -> &NotificationSink {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_for(targets: Vec<TargetConfig>) -> MonitorConfig {
        MonitorConfig {
            targets,
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn test_new_engine_is_uninitialized() {
        let engine = MonitorEngine::new();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(matches!(engine.refresh(), RefreshOutcome::NotReady));
        assert!(engine.current_report().is_empty());
    }

    #[test]
    fn test_invalid_config_keeps_engine_uninitialized() {
        let engine = MonitorEngine::new();
        let mut config = MonitorConfig::default();
        config.check_interval = Duration::ZERO;

        assert!(engine.load_config(config).is_err());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.config().is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous_config() {
        let engine = MonitorEngine::with_config(config_for(vec![TargetConfig::file("/a")])).unwrap();

        let mut bad = config_for(vec![]);
        bad.max_files_per_check = 0;
        assert!(engine.load_config(bad).is_err());

        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.config().unwrap().targets.len(), 1);
    }

    #[test]
    fn test_reload_carries_target_bookkeeping() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let kept = temp_dir.path().join("kept.log");
        fs::write(&kept, "x").unwrap();

        let engine = MonitorEngine::with_config(config_for(vec![TargetConfig::file(&kept)])).unwrap();
        let now = Local::now();
        assert!(engine.refresh_at(now).result().is_some());

        engine
            .load_config(config_for(vec![
                TargetConfig::file(temp_dir.path().join("new.log")),
                TargetConfig::file(&kept),
            ]))
            .unwrap();

        let checks = engine.target_last_checks();
        assert_eq!(checks[0].1, None);
        assert_eq!(checks[1].1, Some(now));
    }

    #[test]
    fn test_per_target_interval_override() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let fast = temp_dir.path().join("fast.log");
        let slow = temp_dir.path().join("slow.log");
        fs::write(&fast, "x").unwrap();
        fs::write(&slow, "x").unwrap();

        let mut config = config_for(vec![
            TargetConfig::file(&fast),
            TargetConfig::file(&slow).with_check_interval(Duration::from_secs(3600)),
        ]);
        config.check_interval = Duration::from_secs(60);
        let engine = MonitorEngine::with_config(config).unwrap();

        let start = Local::now();
        engine.refresh_at(start);
        let later = start + chrono::Duration::seconds(120);
        let result = engine.refresh_at(later).result().cloned().unwrap();

        assert!(result.targets[0].scanned);
        assert!(!result.targets[1].scanned);
        assert_eq!(result.targets[1].status, TargetStatus::Found, "carries last status");

        let checks = engine.target_last_checks();
        assert_eq!(checks[0].1, Some(later));
        assert_eq!(checks[1].1, Some(start));
    }

    #[test]
    fn test_outside_window_does_not_advance_last_check() {
        let now = Local::now();
        let closed = ((now.hour() + 12) % 24) as u8;
        let mut config = config_for(vec![TargetConfig::file("/nonexistent/file")]);
        config.time_range = Some(crate::core::TimeWindow::new(closed, closed));
        let engine = MonitorEngine::with_config(config).unwrap();

        assert!(matches!(engine.refresh_at(now), RefreshOutcome::OutsideTimeWindow));
        assert!(engine.last_check().is_none());
        assert_eq!(engine.target_last_checks()[0].1, None);
    }

    #[test]
    fn test_invalid_pattern_is_reported_not_fatal() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("a.log"), "x").unwrap();

        let engine = MonitorEngine::with_config(config_for(vec![
            TargetConfig::directory(temp_dir.path()).with_pattern("sub/*.log"),
            TargetConfig::directory(temp_dir.path()).with_pattern("*.log"),
        ]))
        .unwrap();

        let result = engine.refresh().result().cloned().unwrap();
        assert_eq!(result.targets[0].found, 0);
        assert_eq!(result.targets[0].errors.len(), 1);
        assert_eq!(result.targets[1].found, 1);
        assert!(engine.current_report().contains("FileMonitor_scan_error"));
    }

    #[test]
    fn test_scan_cap_truncates_pass() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for i in 0..5 {
            fs::write(temp_dir.path().join(format!("f{i}.log")), "x").unwrap();
        }

        let mut config = config_for(vec![
            TargetConfig::directory(temp_dir.path()),
            TargetConfig::directory(temp_dir.path()),
        ]);
        config.max_files_per_check = 3;
        let engine = MonitorEngine::with_config(config).unwrap();

        let result = engine.refresh().result().cloned().unwrap();
        assert!(result.truncated);
        assert_eq!(result.files_found(), 3);
        assert!(!result.targets[1].scanned);
        assert_eq!(engine.target_last_checks()[1].1, None);
    }

    #[test]
    fn test_cap_met_exactly_is_not_truncated() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for i in 0..3 {
            fs::write(temp_dir.path().join(format!("f{i}.log")), "x").unwrap();
        }

        let mut config = config_for(vec![TargetConfig::directory(temp_dir.path())]);
        config.max_files_per_check = 3;
        let engine = MonitorEngine::with_config(config).unwrap();

        let result = engine.refresh().result().cloned().unwrap();
        assert_eq!(result.files_found(), 3);
        assert!(!result.truncated);
        assert!(!engine.current_report().contains("(truncated)"));
    }

    /// Fails for files named `locked*`, removes everything else
    fn refuse_locked(path: &Path) -> Result<(), DeleteError> {
        let locked = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("locked"));
        if locked {
            return Err(DeleteError::Failed {
                path: path.to_path_buf(),
                reason: "Device or resource busy".to_string(),
            });
        }
        delete(path)
    }

    /// Someone else removes the file just before we do
    fn lose_race(path: &Path) -> Result<(), DeleteError> {
        let _ = fs::remove_file(path);
        delete(path)
    }

    #[test]
    fn test_failed_delete_is_reported_and_pass_continues() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for name in ["a.tmp", "locked.tmp", "z.tmp"] {
            fs::write(temp_dir.path().join(name), "x").unwrap();
        }

        let engine = MonitorEngine::with_config(config_for(vec![
            TargetConfig::directory(temp_dir.path()).with_pattern("*.tmp").deleting(),
        ]))
        .unwrap()
        .with_remover(refuse_locked);

        let result = engine.refresh().result().cloned().unwrap();
        let report = &result.targets[0];
        assert_eq!(report.found, 3);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.not_deleted, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Device or resource busy"));

        assert!(!temp_dir.path().join("a.tmp").exists());
        assert!(temp_dir.path().join("locked.tmp").exists());
        assert!(!temp_dir.path().join("z.tmp").exists());

        let body = engine.current_report();
        let failed: Vec<&str> = body
            .lines()
            .filter(|line| line.contains("FileMonitor_delete_failed "))
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].starts_with("2 "));
        assert!(failed[0].contains("locked.tmp"));
        assert!(body.contains("Errors: 1"));
    }

    #[test]
    fn test_vanished_file_is_not_deleted_but_not_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = temp_dir.path().join("racy.tmp");
        fs::write(&file, "x").unwrap();

        let engine = MonitorEngine::with_config(config_for(vec![TargetConfig::file(&file).deleting()]))
            .unwrap()
            .with_remover(lose_race);

        let result = engine.refresh().result().cloned().unwrap();
        let report = &result.targets[0];
        assert_eq!(report.found, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.not_deleted, 1);
        assert!(report.errors.is_empty());
        assert!(!file.exists());

        let body = engine.current_report();
        assert!(!body.contains("FileMonitor_delete_failed"));
        assert!(!body.contains("FileMonitor_file_deleted"));
        assert!(engine
            .notifications()
            .iter()
            .any(|line| line.contains("[INFO]") && line.contains("Not deleted")));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_error_is_recorded_and_walk_continues() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("data");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.log"), "x").unwrap();
        fs::write(root.join("sub").join("b.log"), "x").unwrap();
        fs::write(root.join("z.log"), "x").unwrap();
        // Following this link leads back into the tree being walked
        std::os::unix::fs::symlink(&root, root.join("sub").join("back")).unwrap();

        let other = temp_dir.path().join("other.log");
        fs::write(&other, "x").unwrap();

        let engine = MonitorEngine::with_config(config_for(vec![
            TargetConfig::directory(&root).recursive().with_pattern("*.log"),
            TargetConfig::file(&other),
        ]))
        .unwrap();

        let result = engine.refresh().result().cloned().unwrap();
        let walked = &result.targets[0];
        assert_eq!(walked.found, 3, "files after the loop are still found");
        assert_eq!(walked.errors.len(), 1);
        assert_eq!(walked.status, TargetStatus::Found);
        assert_eq!(result.targets[1].found, 1);

        let body = engine.current_report();
        assert_eq!(
            body.lines()
                .filter(|line| line.contains("FileMonitor_scan_error "))
                .count(),
            1
        );
        assert!(body.contains("Errors: 1"));
    }

    #[test]
    fn test_report_readable_from_other_threads() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("a.log"), "x").unwrap();
        let engine = Arc::new(
            MonitorEngine::with_config(config_for(vec![TargetConfig::directory(temp_dir.path())]))
                .unwrap(),
        );

        let reader = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let report = engine.current_report();
                    assert!(report.is_empty() || report.starts_with("<<<file_monitor>>>"));
                }
            })
        };
        engine.refresh();
        reader.join().unwrap();

        assert_eq!(engine.make_body(), engine.current_report());
    }
}
