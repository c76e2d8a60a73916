use tracing::{debug, error, info, warn};

use super::types::{LogEntry, LogLevel};

/// Last-resort audit trail, written before any store is attempted
pub trait AuditSink: Send + Sync {
    fn emit(&self, entry: &LogEntry);
}

/// Writes every entry to the process log under the `audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn emit(&self, entry: &LogEntry) {
        let user = entry.user_email.as_deref().unwrap_or("-");
        let details = entry
            .details
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_default();

        match entry.level {
            LogLevel::Debug => debug!(
                target: "audit",
                id = %entry.id, source = %entry.source, user, details = %details,
                "{}", entry.message
            ),
            LogLevel::Info | LogLevel::Success => info!(
                target: "audit",
                id = %entry.id, level = %entry.level, source = %entry.source, user, details = %details,
                "{}", entry.message
            ),
            LogLevel::Warning => warn!(
                target: "audit",
                id = %entry.id, source = %entry.source, user, details = %details,
                "{}", entry.message
            ),
            LogLevel::Error => error!(
                target: "audit",
                id = %entry.id, source = %entry.source, user, details = %details,
                "{}", entry.message
            ),
        }
    }
}
