use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::observability::Metrics;

use super::clock::ScoreClock;
use super::error::{LogError, StoreError};
use super::memory::MemoryStore;
use super::sink::{AuditSink, TracingSink};
use super::store::{LogStore, StoreKind};
use super::types::{LogCounts, LogEntry, LogFilter, NewLogEntry, Page};

/// Outcome of [`LogService::record`]
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub entry: LogEntry,
    pub store: StoreKind,
}

impl Recorded {
    /// True when the entry only reached the non-durable fallback
    pub fn is_fallback(&self) -> bool {
        self.store == StoreKind::Memory
    }
}

/// A query result tagged with the store that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub store: StoreKind,
}

impl<T> Served<T> {
    pub fn is_fallback(&self) -> bool {
        self.store == StoreKind::Memory
    }
}

/// Aggregate view used by status endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStatus {
    pub counts: LogCounts,
    pub sources: BTreeSet<String>,
    pub total: u64,
}

/// Store chosen for a single call
enum ActiveStore<'a> {
    Durable(&'a dyn LogStore),
    Memory(&'a MemoryStore),
}

impl ActiveStore<'_> {
    fn store(&self) -> &dyn LogStore {
        match self {
            ActiveStore::Durable(store) => *store,
            ActiveStore::Memory(store) => *store,
        }
    }

    fn kind(&self) -> StoreKind {
        match self {
            ActiveStore::Durable(_) => StoreKind::Durable,
            ActiveStore::Memory(_) => StoreKind::Memory,
        }
    }
}

/// Entry point for recording and querying activity logs
///
/// Recording never fails because of storage: a durable failure falls back to
/// the in-memory store, and only the loss of both surfaces as
/// [`LogError::FallbackExhausted`]. Queries use the durable store whenever it
/// answers a ping; once selected, its failures surface as
/// [`LogError::StoreUnavailable`] instead of being replaced by fallback data.
#[derive(bon::Builder)]
pub struct LogService {
    durable: Option<Arc<dyn LogStore>>,
    #[builder(default = Arc::new(MemoryStore::default()))]
    memory: Arc<MemoryStore>,
    #[builder(default = Arc::new(TracingSink))]
    sink: Arc<dyn AuditSink>,
    #[builder(default)]
    metrics: Arc<Metrics>,
    #[builder(skip)]
    clock: ScoreClock,
}

impl LogService {
    pub fn has_durable_store(&self) -> bool {
        self.durable.is_some()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Validate, stamp and store an entry
    pub async fn record(&self, new_entry: NewLogEntry) -> Result<Recorded, LogError> {
        new_entry.validate()?;

        let entry = self.clock.stamp(new_entry);
        self.sink.emit(&entry);

        if let Some(durable) = &self.durable {
            match durable.append(&entry).await {
                Ok(()) => {
                    self.metrics.entry_recorded();
                    return Ok(Recorded {
                        entry,
                        store: StoreKind::Durable,
                    });
                }
                Err(err) => {
                    warn!(id = %entry.id, error = %err, "Durable append failed, falling back to memory");
                }
            }
        }

        match self.memory.insert(&entry) {
            Ok(()) => {
                self.metrics.entry_fallback();
                debug!(id = %entry.id, "Entry recorded in memory");
                Ok(Recorded {
                    entry,
                    store: StoreKind::Memory,
                })
            }
            Err(reason) => {
                self.metrics.record_failed();
                error!(id = %entry.id, error = %reason, "Entry could not be stored anywhere");
                Err(LogError::FallbackExhausted {
                    entry: Box::new(entry),
                    reason,
                })
            }
        }
    }

    /// Durable when configured and reachable, memory otherwise
    async fn select(&self) -> ActiveStore<'_> {
        if let Some(durable) = &self.durable {
            match durable.ping().await {
                Ok(()) => return ActiveStore::Durable(durable.as_ref()),
                Err(err) => warn!(error = %err, "Durable store unreachable, serving from memory"),
            }
        }
        ActiveStore::Memory(&self.memory)
    }

    fn query_error(&self, err: StoreError) -> LogError {
        self.metrics.query_failed();
        LogError::StoreUnavailable(err)
    }

    /// Entries matching `filter`, newest first
    pub async fn query(&self, filter: &LogFilter, page: Page) -> Result<Served<Vec<LogEntry>>, LogError> {
        let active = self.select().await;
        let value = active
            .store()
            .list(filter, page)
            .await
            .map_err(|err| self.query_error(err))?;

        Ok(Served {
            value,
            store: active.kind(),
        })
    }

    pub async fn counts(&self) -> Result<Served<LogCounts>, LogError> {
        let active = self.select().await;
        let value = active
            .store()
            .counts_by_level()
            .await
            .map_err(|err| self.query_error(err))?;

        Ok(Served {
            value,
            store: active.kind(),
        })
    }

    pub async fn sources(&self) -> Result<Served<BTreeSet<String>>, LogError> {
        let active = self.select().await;
        let value = active
            .store()
            .sources()
            .await
            .map_err(|err| self.query_error(err))?;

        Ok(Served {
            value,
            store: active.kind(),
        })
    }

    /// Counts, sources and total read from one store selection
    pub async fn status(&self) -> Result<Served<LogStatus>, LogError> {
        let active = self.select().await;
        let store = active.store();

        let (counts, sources) = tokio::try_join!(store.counts_by_level(), store.sources())
            .map_err(|err| self.query_error(err))?;

        Ok(Served {
            value: LogStatus {
                total: counts.total(),
                counts,
                sources,
            },
            store: active.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::error::ValidationError;
    use crate::logs::types::LogLevel;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory-backed stand-in for the durable store with switchable outages
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        down: AtomicBool,
        reads_fail: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> crate::logs::error::Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }

        fn check_read(&self) -> crate::logs::error::Result<()> {
            self.check()?;
            if self.reads_fail.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LogStore for FlakyStore {
        fn kind(&self) -> StoreKind {
            StoreKind::Durable
        }

        async fn append(&self, entry: &LogEntry) -> crate::logs::error::Result<()> {
            self.check()?;
            self.inner.insert(entry)
        }

        async fn list(&self, filter: &LogFilter, page: Page) -> crate::logs::error::Result<Vec<LogEntry>> {
            self.check_read()?;
            self.inner.list_sync(filter, page)
        }

        async fn counts_by_level(&self) -> crate::logs::error::Result<LogCounts> {
            self.check_read()?;
            self.inner.counts_sync()
        }

        async fn sources(&self) -> crate::logs::error::Result<BTreeSet<String>> {
            self.check_read()?;
            self.inner.sources_sync()
        }

        async fn ping(&self) -> crate::logs::error::Result<()> {
            self.check()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl RecordingSink {
        fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    impl AuditSink for RecordingSink {
        fn emit(&self, entry: &LogEntry) {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }

    struct Harness {
        service: LogService,
        durable: Arc<FlakyStore>,
        memory: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness_with_capacity(capacity: usize) -> Harness {
        let durable = Arc::new(FlakyStore::default());
        let memory = Arc::new(MemoryStore::new(capacity));
        let sink = Arc::new(RecordingSink::default());
        let service = LogService::builder()
            .durable(durable.clone())
            .memory(memory.clone())
            .sink(sink.clone())
            .build();

        Harness {
            service,
            durable,
            memory,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with_capacity(100)
    }

    fn new_entry(level: LogLevel, message: &str, source: &str) -> NewLogEntry {
        NewLogEntry::builder()
            .level(level)
            .message(message)
            .source(source)
            .build()
    }

    #[tokio::test]
    async fn test_record_goes_to_durable_store() {
        let h = harness();
        let recorded = h
            .service
            .record(new_entry(LogLevel::Info, "signed in", "auth"))
            .await
            .unwrap();

        assert_eq!(recorded.store, StoreKind::Durable);
        assert!(!recorded.is_fallback());
        assert_eq!(h.durable.inner.len(), 1);
        assert!(h.memory.is_empty());
        assert_eq!(h.sink.len(), 1);
    }

    #[tokio::test]
    async fn test_counts_match_recorded_levels() {
        let h = harness();
        let levels = [
            LogLevel::Info,
            LogLevel::Error,
            LogLevel::Info,
            LogLevel::Success,
            LogLevel::Warning,
            LogLevel::Info,
        ];
        for (i, level) in levels.iter().enumerate() {
            h.service
                .record(new_entry(*level, &format!("event {i}"), "editor"))
                .await
                .unwrap();
        }

        let counts = h.service.counts().await.unwrap();
        assert_eq!(counts.store, StoreKind::Durable);
        assert_eq!(counts.value.info, 3);
        assert_eq!(counts.value.error, 1);
        assert_eq!(counts.value.success, 1);
        assert_eq!(counts.value.warning, 1);
        assert_eq!(counts.value.debug, 0);
        assert_eq!(counts.value.total(), levels.len() as u64);
    }

    #[tokio::test]
    async fn test_rapid_records_come_back_newest_first() {
        let h = harness();
        let mut ids = Vec::new();
        for message in ["first", "second", "third", "fourth"] {
            let recorded = h
                .service
                .record(new_entry(LogLevel::Debug, message, "burst"))
                .await
                .unwrap();
            ids.push(recorded.entry.id);
        }

        let listed = h
            .service
            .query(&LogFilter::default(), Page::new(10, 0))
            .await
            .unwrap()
            .value;
        let listed_ids: Vec<_> = listed.iter().map(|e| e.id.clone()).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);
        assert!(listed.windows(2).all(|w| w[0].score > w[1].score));
    }

    #[tokio::test]
    async fn test_repeated_source_does_not_grow_sources() {
        let h = harness();
        h.service
            .record(new_entry(LogLevel::Info, "a", "redis-test"))
            .await
            .unwrap();
        let once = h.service.sources().await.unwrap().value.len();

        h.service
            .record(new_entry(LogLevel::Error, "b", "redis-test"))
            .await
            .unwrap();
        let twice = h.service.sources().await.unwrap().value;

        assert_eq!(twice.len(), once);
        assert!(twice.contains("redis-test"));
    }

    #[tokio::test]
    async fn test_details_are_returned_unchanged() {
        let h = harness();
        let details = json!({
            "achievement": {"id": "first-post", "tier": 2},
            "tags": ["a", "b"],
            "meta": {"nested": {"deep": null, "ratio": 0.5}}
        });
        let new = NewLogEntry::builder()
            .level(LogLevel::Success)
            .message("achievement unlocked")
            .source("gamification")
            .user_email("player@example.com")
            .details(details.clone())
            .build();

        h.service.record(new).await.unwrap();
        let listed = h
            .service
            .query(&LogFilter::default(), Page::new(1, 0))
            .await
            .unwrap();
        assert_eq!(listed.value[0].details.as_ref(), Some(&details));
    }

    #[tokio::test]
    async fn test_record_falls_back_when_durable_is_down() {
        let h = harness();
        h.durable.down.store(true, Ordering::SeqCst);

        let recorded = h
            .service
            .record(new_entry(LogLevel::Error, "disk full", "backup"))
            .await
            .unwrap();
        assert!(recorded.is_fallback());
        assert_eq!(h.sink.len(), 1);

        let listed = h
            .service
            .query(&LogFilter::default(), Page::new(10, 0))
            .await
            .unwrap();
        assert!(listed.is_fallback());
        assert_eq!(listed.value.len(), 1);
        assert_eq!(listed.value[0].id, recorded.entry.id);

        let status = h.service.status().await.unwrap();
        assert_eq!(status.store, StoreKind::Memory);
        assert_eq!(status.value.total, 1);
        assert_eq!(status.value.counts.error, 1);
    }

    #[tokio::test]
    async fn test_invalid_entry_reaches_no_store() {
        let h = harness();

        let err = h
            .service
            .record(new_entry(LogLevel::Info, "", "src"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogError::Validation(ValidationError::MissingField("message"))
        ));

        assert!(NewLogEntry::parse("", "msg", "src", None, None).is_err());
        assert!(h.durable.inner.is_empty());
        assert!(h.memory.is_empty());
        assert_eq!(h.sink.len(), 0);
    }

    #[tokio::test]
    async fn test_fallback_exhausted_keeps_entry_for_caller() {
        let h = harness_with_capacity(0);
        h.durable.down.store(true, Ordering::SeqCst);

        let err = h
            .service
            .record(new_entry(LogLevel::Warning, "quota", "billing"))
            .await
            .unwrap_err();

        match err {
            LogError::FallbackExhausted { entry, reason } => {
                assert_eq!(entry.message, "quota");
                assert!(matches!(reason, StoreError::CapacityExhausted(0)));
            }
            other => panic!("Expected FallbackExhausted, got {other:?}"),
        }
        assert_eq!(h.sink.len(), 1);
        assert_eq!(h.service.metrics().snapshot().record_failures, 1);
    }

    #[tokio::test]
    async fn test_durable_read_failure_is_not_masked() {
        let h = harness();
        h.service
            .record(new_entry(LogLevel::Info, "kept", "auth"))
            .await
            .unwrap();
        h.durable.reads_fail.store(true, Ordering::SeqCst);

        let err = h
            .service
            .query(&LogFilter::default(), Page::new(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::StoreUnavailable(_)));

        assert!(matches!(
            h.service.counts().await,
            Err(LogError::StoreUnavailable(_))
        ));
        assert_eq!(h.service.metrics().snapshot().query_failures, 2);
    }

    #[tokio::test]
    async fn test_without_durable_store_everything_is_memory() {
        let service = LogService::builder().build();
        assert!(!service.has_durable_store());

        let recorded = service
            .record(new_entry(LogLevel::Info, "booted", "system"))
            .await
            .unwrap();
        assert!(recorded.is_fallback());

        let sources = service.sources().await.unwrap();
        assert!(sources.is_fallback());
        assert!(sources.value.contains("system"));
    }
}
