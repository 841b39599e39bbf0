//! Notification sink: timestamped log lines plus a structured status stream
//!
//! Both histories are bounded ring buffers; the oldest line is dropped once
//! the configured capacity is reached. All mutations go through one mutex so
//! lines from concurrent callers never interleave.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use chrono::{DateTime, Local};

use super::events::{EventKind, Level};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
struct SinkBuffer {
    lines: VecDeque<String>,
    events: VecDeque<String>,
    capacity: usize,
}

impl SinkBuffer {
    fn push(queue: &mut VecDeque<String>, line: String, capacity: usize) {
        queue.push_back(line);
        while queue.len() > capacity {
            queue.pop_front();
        }
    }

    fn shrink_to(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.lines.len() > capacity {
            self.lines.pop_front();
        }
        while self.events.len() > capacity {
            self.events.pop_front();
        }
    }
}

#[derive(Debug)]
pub struct NotificationSink {
    inner: Mutex<SinkBuffer>,
}

impl NotificationSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SinkBuffer {
                lines: VecDeque::new(),
                events: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, SinkBuffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_capacity(&self, capacity: usize) {
        self.buffer().shrink_to(capacity.max(1));
    }

    /// Append a timestamped, leveled line and forward it to `tracing`
    pub fn record(&self, message: &str, level: Level) -> String {
        self.record_at(message, level, Local::now())
    }

    pub fn record_at(&self, message: &str, level: Level, at: DateTime<Local>) -> String {
        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }

        let line = format!(
            "{} [{}] {}",
            at.format(TIMESTAMP_FORMAT),
            level,
            single_line(message)
        );
        let mut buffer = self.buffer();
        let capacity = buffer.capacity;
        SinkBuffer::push(&mut buffer.lines, line.clone(), capacity);
        line
    }

    /// Append a machine-parsable status line:
    /// `<code> FileMonitor_<kind> path=<subject>|message=<text>`
    pub fn emit_structured_event(&self, kind: EventKind, subject: &str, message: &str) -> String {
        let line = format_structured(kind, subject, message);
        let mut buffer = self.buffer();
        let capacity = buffer.capacity;
        SinkBuffer::push(&mut buffer.events, line.clone(), capacity);
        line
    }

    /// Snapshot of the notification history, oldest first
    pub fn notifications(&self) -> Vec<String> {
        self.buffer().lines.iter().cloned().collect()
    }

    /// Snapshot of the structured event history, oldest first
    pub fn structured_events(&self) -> Vec<String> {
        self.buffer().events.iter().cloned().collect()
    }
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_LIMIT)
    }
}

pub fn format_structured(kind: EventKind, subject: &str, message: &str) -> String {
    format!(
        "{} FileMonitor_{} path={}|message={}",
        kind.status().code(),
        kind.name(),
        single_line(subject),
        single_line(message)
    )
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
