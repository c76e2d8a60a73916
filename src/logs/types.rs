use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ValidationError;

/// Maximum length of a `source` identifier
pub const MAX_SOURCE_LEN: usize = 64;

/// Severity of a log entry. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "success" => Ok(LogLevel::Success),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "" => Err(ValidationError::MissingField("level")),
            other => Err(ValidationError::UnknownLevel(other.to_string())),
        }
    }
}

/// A recorded activity-log entry. Immutable once stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Sort key of the time-ordered index, strictly increasing per append
    pub score: u64,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Caller-supplied fields of an entry, before id/timestamp/score are assigned.
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct NewLogEntry {
    pub level: LogLevel,
    #[builder(into)]
    pub message: String,
    #[builder(into)]
    pub source: String,
    #[builder(into)]
    pub user_email: Option<String>,
    pub details: Option<Value>,
}

impl NewLogEntry {
    /// Build and validate an entry from untyped caller input
    pub fn parse(
        level: &str,
        message: impl Into<String>,
        source: impl Into<String>,
        user_email: Option<String>,
        details: Option<Value>,
    ) -> Result<Self, ValidationError> {
        let entry = NewLogEntry::builder()
            .level(level.parse()?)
            .message(message)
            .source(source)
            .maybe_user_email(user_email.filter(|email| !email.trim().is_empty()))
            .maybe_details(details)
            .build();
        entry.validate()?;
        Ok(entry)
    }

    /// Reject entries that must never reach a store
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.trim().is_empty() {
            return Err(ValidationError::MissingField("message"));
        }

        let source = self.source.trim();
        if source.is_empty() {
            return Err(ValidationError::MissingField("source"));
        }
        if source.len() > MAX_SOURCE_LEN {
            return Err(ValidationError::SourceTooLong(source.len()));
        }

        Ok(())
    }
}

/// Optional level/source predicate for listing entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.source.is_none()
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = self.level {
            if entry.level != level {
                return false;
            }
        }

        match &self.source {
            Some(source) => entry.source == *source,
            None => true,
        }
    }
}

/// Pagination window over the newest-first ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Number of leading matches needed to fill this page
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

/// Number of entries recorded per level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCounts {
    pub debug: u64,
    pub info: u64,
    pub success: u64,
    pub warning: u64,
    pub error: u64,
}

impl LogCounts {
    pub fn get(&self, level: LogLevel) -> u64 {
        match level {
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Success => self.success,
            LogLevel::Warning => self.warning,
            LogLevel::Error => self.error,
        }
    }

    fn slot(&mut self, level: LogLevel) -> &mut u64 {
        match level {
            LogLevel::Debug => &mut self.debug,
            LogLevel::Info => &mut self.info,
            LogLevel::Success => &mut self.success,
            LogLevel::Warning => &mut self.warning,
            LogLevel::Error => &mut self.error,
        }
    }

    pub fn set(&mut self, level: LogLevel, count: u64) {
        *self.slot(level) = count;
    }

    pub fn increment(&mut self, level: LogLevel) {
        *self.slot(level) += 1;
    }

    pub fn decrement(&mut self, level: LogLevel) {
        let slot = self.slot(level);
        *slot = slot.saturating_sub(1);
    }

    pub fn total(&self) -> u64 {
        LogLevel::ALL.iter().map(|level| self.get(*level)).sum()
    }
}
