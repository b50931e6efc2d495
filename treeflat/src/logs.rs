//! Pipeline log output.
//!
//! All progress and diagnostics go to stderr so that table data can be
//! streamed to stdout. The logger is global and configured once by the CLI.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

/// How much the logger prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Everything except debug entries
    Normal,
    /// Everything
    Verbose,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
    /// RFC 3339 time, set when the entry is written as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            timestamp: None,
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(chrono::Utc::now().to_rfc3339());
        self
    }

    /// Render for a terminal
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Debug => "   ·",
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// Global logger
pub static LOGGER: Lazy<Logger> = Lazy::new(Logger::new);

/// Writes log entries to stderr, as text or JSON lines
pub struct Logger {
    verbosity: AtomicU8,
    json: AtomicBool,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            verbosity: AtomicU8::new(Verbosity::Normal as u8),
            json: AtomicBool::new(false),
        }
    }

    pub fn set_verbosity(&self, verbosity: Verbosity) {
        self.verbosity.store(verbosity as u8, Ordering::Relaxed);
    }

    pub fn verbosity(&self) -> Verbosity {
        match self.verbosity.load(Ordering::Relaxed) {
            0 => Verbosity::Quiet,
            1 => Verbosity::Normal,
            _ => Verbosity::Verbose,
        }
    }

    /// Emit one JSON object per line instead of decorated text
    pub fn set_json(&self, json: bool) {
        self.json.store(json, Ordering::Relaxed);
    }

    /// Whether an entry at `level` would be printed
    pub fn enabled(&self, level: LogLevel) -> bool {
        match self.verbosity() {
            Verbosity::Quiet => level >= LogLevel::Warning,
            Verbosity::Normal => level >= LogLevel::Info,
            Verbosity::Verbose => true,
        }
    }

    pub fn log(&self, entry: LogEntry) {
        if !self.enabled(entry.level) {
            return;
        }
        if self.json.load(Ordering::Relaxed) {
            let entry = entry.stamped();
            match serde_json::to_string(&entry) {
                Ok(line) => eprintln!("{}", line),
                Err(_) => eprintln!("{}", entry.render()),
            }
        } else {
            eprintln!("{}", entry.render());
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_debug(msg: impl Into<String>) {
    LOGGER.log(LogEntry::debug(msg));
}

pub fn log_info(msg: impl Into<String>) {
    LOGGER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOGGER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOGGER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOGGER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOGGER.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_filters_info() {
        let logger = Logger::new();
        logger.set_verbosity(Verbosity::Quiet);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(!logger.enabled(LogLevel::Success));
        assert!(logger.enabled(LogLevel::Warning));
        assert!(logger.enabled(LogLevel::Error));
    }

    #[test]
    fn test_debug_only_when_verbose() {
        let logger = Logger::new();
        assert!(!logger.enabled(LogLevel::Debug));
        logger.set_verbosity(Verbosity::Verbose);
        assert!(logger.enabled(LogLevel::Debug));
        assert_eq!(logger.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = LogEntry::warning("too big").with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "too big");
        assert_eq!(json["indent"], 1);
        assert!(json.get("timestamp").is_none());

        let stamped = serde_json::to_value(LogEntry::info("x").stamped()).unwrap();
        assert!(stamped["timestamp"].as_str().is_some_and(|t| t.contains('T')));
    }

    #[test]
    fn test_render_indent() {
        let rendered = LogEntry::info("x").with_indent(2).render();
        assert!(rendered.starts_with("      "));
        assert!(rendered.ends_with(" x"));
    }
}
