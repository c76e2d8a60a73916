//! Process-local fallback store
//!
//! Used only while the durable store is unreachable. Nothing here survives a
//! restart. The store holds at most `capacity` entries and evicts the oldest
//! first; counts and sources always describe the retained window, so a
//! source disappears once its last retained entry is evicted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::error::{Result, StoreError};
use super::store::{LogStore, StoreKind};
use super::types::{LogCounts, LogEntry, LogFilter, Page};

pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<u64, LogEntry>,
    counts: LogCounts,
    /// source -> number of retained entries carrying it
    sources: BTreeMap<String, usize>,
}

impl MemoryState {
    fn track(&mut self, entry: &LogEntry) {
        self.counts.increment(entry.level);
        *self.sources.entry(entry.source.clone()).or_insert(0) += 1;
    }

    fn untrack(&mut self, entry: &LogEntry) {
        self.counts.decrement(entry.level);
        if let Some(refs) = self.sources.get_mut(&entry.source) {
            *refs -= 1;
            if *refs == 0 {
                self.sources.remove(&entry.source);
            }
        }
    }
}

/// Bounded, mutex-guarded in-memory log store
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn insert(&self, entry: &LogEntry) -> Result<()> {
        if self.capacity == 0 {
            return Err(StoreError::CapacityExhausted(self.capacity));
        }

        let mut state = self.lock()?;
        if let Some(replaced) = state.entries.insert(entry.score, entry.clone()) {
            state.untrack(&replaced);
        }
        state.track(entry);

        while state.entries.len() > self.capacity {
            let Some((score, evicted)) = state.entries.pop_first() else {
                break;
            };
            state.untrack(&evicted);
            debug!(score, id = %evicted.id, "Evicted oldest in-memory entry");
        }

        Ok(())
    }

    pub fn list_sync(&self, filter: &LogFilter, page: Page) -> Result<Vec<LogEntry>> {
        let state = self.lock()?;
        Ok(state
            .entries
            .values()
            .rev()
            .filter(|entry| filter.matches(entry))
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    pub fn counts_sync(&self) -> Result<LogCounts> {
        Ok(self.lock()?.counts)
    }

    pub fn sources_sync(&self) -> Result<BTreeSet<String>> {
        Ok(self.lock()?.sources.keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    async fn append(&self, entry: &LogEntry) -> Result<()> {
        self.insert(entry)
    }

    async fn list(&self, filter: &LogFilter, page: Page) -> Result<Vec<LogEntry>> {
        self.list_sync(filter, page)
    }

    async fn counts_by_level(&self) -> Result<LogCounts> {
        self.counts_sync()
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        self.sources_sync()
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
