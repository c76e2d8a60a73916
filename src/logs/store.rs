use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;

use super::error::Result;
use super::types::{LogCounts, LogEntry, LogFilter, Page};

/// Which store variant served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Durable,
    Memory,
}

/// Storage capability shared by the durable and in-memory variants
///
/// Listing is newest-first by score. Implementations maintain counts and
/// sources incrementally on `append`; they never rescan entries to answer
/// `counts_by_level` or `sources`.
#[async_trait]
pub trait LogStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// Persist a stamped entry together with its index, counter and source
    async fn append(&self, entry: &LogEntry) -> Result<()>;

    async fn list(&self, filter: &LogFilter, page: Page) -> Result<Vec<LogEntry>>;

    async fn counts_by_level(&self) -> Result<LogCounts>;

    async fn sources(&self) -> Result<BTreeSet<String>>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<()>;
}
