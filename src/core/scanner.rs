//! Candidate enumeration and filtering for one monitored target
//!
//! [`TargetScanner`] is a lazy iterator: each call to `next` pulls at most as
//! many directory entries as needed to produce the next item. Once the match
//! budget is spent the scanner only walks far enough to find one more match,
//! which tells it whether anything was cut off, and then stops.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use chrono::{DateTime, Local, Timelike};
use ignore::{Walk, WalkBuilder};
use serde::Serialize;

use super::pattern::PatternSet;
use super::window::{self, TimeWindow};
use crate::config::{MonitorConfig, TargetConfig};
use crate::error::{PatternError, ScanError};

/// A file that passed pattern, exclusion, size and age filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug)]
pub enum ScanItem {
    Matched(MatchedEntry),
    /// The target path does not exist; yielded once, not an error
    Missing,
    /// A subtree or entry could not be read; the scan continues past it
    Failed(ScanError),
}

enum Candidates {
    Missing,
    Single(Option<PathBuf>),
    Walk(Walk),
    Done,
}

pub struct TargetScanner {
    patterns: PatternSet,
    min_size: Option<u64>,
    min_age: Option<Duration>,
    window: Option<TimeWindow>,
    now: DateTime<Local>,
    limit: usize,
    produced: usize,
    truncated: bool,
    candidates: Candidates,
}

/// Start scanning `target` with the global settings in `config`
pub fn scan(
    target: &TargetConfig,
    config: &MonitorConfig,
    now: DateTime<Local>,
) -> Result<TargetScanner, PatternError> {
    TargetScanner::new(target, config, now)
}

impl TargetScanner {
    pub fn new(
        target: &TargetConfig,
        config: &MonitorConfig,
        now: DateTime<Local>,
    ) -> Result<Self, PatternError> {
        let patterns = PatternSet::compile(&target.pattern, &target.exclude_patterns)?;

        let candidates = if !target.path.exists() {
            Candidates::Missing
        } else if target.is_directory {
            Candidates::Walk(
                WalkBuilder::new(&target.path)
                    .standard_filters(false)
                    .follow_links(true)
                    .max_depth(if target.recursive { None } else { Some(1) })
                    .sort_by_file_name(|a, b| a.cmp(b))
                    .build(),
            )
        } else {
            Candidates::Single(Some(target.path.clone()))
        };

        Ok(Self {
            patterns,
            min_size: target.min_size,
            min_age: target.min_age,
            window: config.time_range,
            now,
            limit: config.max_files_per_check,
            produced: 0,
            truncated: false,
            candidates,
        })
    }

    /// Cap the number of matches this scanner yields
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Number of matches yielded so far
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// Whether a match was left unreported because the budget ran out.
    /// Only meaningful once the iterator has returned `None`.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Look for one more match past the budget, then stop the walk for good
    fn overflows(&mut self) -> bool {
        let overflows = loop {
            match self.next_candidate() {
                None => break false,
                Some(Ok((path, explicit))) => {
                    if let Ok(Some(_)) = self.evaluate(&path, explicit) {
                        break true;
                    }
                }
                Some(Err(_)) => {}
            }
        };
        self.candidates = Candidates::Done;
        overflows
    }

    fn next_candidate(&mut self) -> Option<Result<(PathBuf, bool), ScanError>> {
        match &mut self.candidates {
            Candidates::Single(slot) => slot.take().map(|path| Ok((path, true))),
            Candidates::Walk(walk) => loop {
                match walk.next()? {
                    Ok(entry) => {
                        let is_root_dir = entry.depth() == 0
                            && entry.file_type().map_or(false, |t| t.is_dir());
                        if is_root_dir {
                            continue;
                        }
                        return Some(Ok((entry.into_path(), false)));
                    }
                    Err(err) => {
                        return Some(Err(ScanError::Walk {
                            path: walk_error_path(&err),
                            reason: err.to_string(),
                        }));
                    }
                }
            },
            Candidates::Missing | Candidates::Done => None,
        }
    }

    /// Apply the time window, patterns and size/age filters to one candidate.
    /// `explicit` marks a path named directly by the configuration, for which
    /// anything but a regular file is an error rather than a silent skip.
    fn evaluate(&self, path: &Path, explicit: bool) -> Result<Option<MatchedEntry>, ScanError> {
        if !window::allowed(self.now.hour(), self.window) {
            return Ok(None);
        }

        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return Ok(None);
        };
        if !self.patterns.accepts(&name) {
            tracing::trace!("{} does not match", path.display());
            return Ok(None);
        }

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            // Removed between enumeration and stat
            Err(err) if err.kind() == ErrorKind::NotFound && !explicit => return Ok(None),
            Err(source) => {
                return Err(ScanError::Metadata {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if !metadata.is_file() {
            if explicit {
                return Err(ScanError::NotAFile(path.to_path_buf()));
            }
            return Ok(None);
        }

        let size = metadata.len();
        if self.min_size.is_some_and(|min| size < min) {
            tracing::trace!("{} is smaller than the minimum size", path.display());
            return Ok(None);
        }

        let modified = metadata.modified().ok();
        if let Some(min_age) = self.min_age {
            let old_enough = modified.is_some_and(|m| self.age_of(m) >= min_age);
            if !old_enough {
                tracing::trace!("{} is younger than the minimum age", path.display());
                return Ok(None);
            }
        }

        Ok(Some(MatchedEntry {
            path: path.to_path_buf(),
            size,
            modified,
        }))
    }

    fn age_of(&self, modified: SystemTime) -> Duration {
        (self.now - DateTime::<Local>::from(modified))
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl Iterator for TargetScanner {
    type Item = ScanItem;

    fn next(&mut self) -> Option<ScanItem> {
        if matches!(self.candidates, Candidates::Missing) {
            self.candidates = Candidates::Done;
            return Some(ScanItem::Missing);
        }

        while self.produced < self.limit {
            let (path, explicit) = match self.next_candidate()? {
                Ok(candidate) => candidate,
                Err(err) => return Some(ScanItem::Failed(err)),
            };
            match self.evaluate(&path, explicit) {
                Ok(Some(entry)) => {
                    self.produced += 1;
                    return Some(ScanItem::Matched(entry));
                }
                Ok(None) => continue,
                Err(err) => return Some(ScanItem::Failed(err)),
            }
        }
        if self.overflows() {
            tracing::debug!("Match budget of {} exhausted", self.limit);
            self.truncated = true;
        }
        None
    }
}

fn walk_error_path(err: &ignore::Error) -> PathBuf {
    match err {
        ignore::Error::WithPath { path, .. } => path.clone(),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        ignore::Error::Loop { child, .. } => child.clone(),
        _ => PathBuf::new(),
    }
}
