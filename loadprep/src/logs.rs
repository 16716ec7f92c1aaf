//! Logging collaborator for pipeline stages.
//!
//! Stages receive a `&dyn PipelineLog` instead of writing to a global
//! logger, so a run can print to the console, forward to `tracing`, or
//! collect its entries for a report.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Receives human-readable progress and diagnostics from stages.
pub trait PipelineLog {
    fn log(&self, entry: LogEntry);

    fn info(&self, msg: &str) {
        self.log(LogEntry::info(msg));
    }

    fn success(&self, msg: &str) {
        self.log(LogEntry::success(msg));
    }

    fn warning(&self, msg: &str) {
        self.log(LogEntry::warning(msg));
    }

    fn error(&self, msg: &str) {
        self.log(LogEntry::error(msg));
    }

    fn info_indent(&self, msg: &str, indent: u8) {
        self.log(LogEntry::info(msg).with_indent(indent));
    }
}

/// Prints entries to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLog;

impl PipelineLog for ConsoleLog {
    fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(entry.indent as usize);
        println!("{}{} {}", indent, prefix, entry.message);
    }
}

/// Forwards entries to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl PipelineLog for TracingLog {
    fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => tracing::info!(indent = entry.indent, "{}", entry.message),
            LogLevel::Success => tracing::info!(indent = entry.indent, success = true, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(indent = entry.indent, "{}", entry.message),
            LogLevel::Error => tracing::error!(indent = entry.indent, "{}", entry.message),
        }
    }
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    /// True if any entry at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl PipelineLog for MemoryLog {
    fn log(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Sends every entry to two logs.
pub struct TeeLog<'a> {
    first: &'a dyn PipelineLog,
    second: &'a dyn PipelineLog,
}

impl<'a> TeeLog<'a> {
    pub fn new(first: &'a dyn PipelineLog, second: &'a dyn PipelineLog) -> Self {
        Self { first, second }
    }
}

impl PipelineLog for TeeLog<'_> {
    fn log(&self, entry: LogEntry) {
        self.first.log(entry.clone());
        self.second.log(entry);
    }
}

/// Install the process-wide `tracing` subscriber used by the CLI.
///
/// `RUST_LOG` overrides the default `loadprep=info` filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("loadprep=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_collects() {
        let log = MemoryLog::new();
        log.info("3 duplicate rows dropped.");
        log.error("boom");

        assert_eq!(log.entries().len(), 2);
        assert!(log.contains(LogLevel::Info, "duplicate"));
        assert!(log.contains(LogLevel::Error, "boom"));
        assert!(!log.contains(LogLevel::Warning, "boom"));
    }

    #[test]
    fn test_tee_log_duplicates_entries() {
        let a = MemoryLog::new();
        let b = MemoryLog::new();
        let tee = TeeLog::new(&a, &b);
        tee.warning("careful");
        assert_eq!(a.messages(), vec!["careful"]);
        assert_eq!(b.messages(), vec!["careful"]);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = LogEntry::success("done").with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "success");
        assert_eq!(json["indent"], 1);
    }
}
