//! Request and response bodies of the activity-log API.
//!
//! Field names are camelCase on the wire. Responses served from the in-memory
//! fallback carry `"fallback": true`; the flag is omitted otherwise.
//!
//! A record request:
//!
//! ```json
//! {
//!   "level": "error",
//!   "message": "disk full",
//!   "source": "backup",
//!   "userEmail": "ops@example.com",
//!   "details": { "volume": "/dev/sda1", "freeBytes": 0 }
//! }
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logs::{LogCounts, LogEntry};
use crate::observability::MetricsSnapshot;

/// Body of `POST /api/record-log`. Required fields are optional here so
/// their absence is reported as a validation error, not a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLogRequest {
    pub level: Option<String>,
    pub message: Option<String>,
    pub source: Option<String>,
    pub user_email: Option<String>,
    pub details: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordLogResponse {
    pub success: bool,
    pub data: LogEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    /// Set when no store accepted the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogsStatusResponse {
    pub counts: LogCounts,
    pub sources: BTreeSet<String>,
    pub total: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogsResponse {
    pub data: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

/// Query string of `GET /api/logs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    pub level: Option<String>,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub metrics: MetricsSnapshot,
}

/// `Some(true)` only for responses served by the fallback store
pub(crate) fn fallback_flag(is_fallback: bool) -> Option<bool> {
    is_fallback.then_some(true)
}
