//! Redis-backed durable store
//!
//! One `MULTI/EXEC` pipeline records an event: entry body, index member,
//! level counter and source set move together or not at all. See
//! [`KeyLayout`] for the key structure.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, FromRedisValue, RedisError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::{Result, StoreError};
use super::keys::KeyLayout;
use super::store::{LogStore, StoreKind};
use super::types::{LogCounts, LogEntry, LogFilter, LogLevel, Page};

/// Index members read per round trip while scanning for filtered results
const SCAN_BATCH: usize = 200;

/// Largest index position Redis accepts in a range command
const MAX_INDEX: usize = i64::MAX as usize;

/// Tunables for the durable store
#[derive(Debug, Clone)]
pub struct RedisOptions {
    pub key_prefix: String,
    pub timeout: Duration,
    pub retry_backoff: Duration,
    /// Upper bound on index members examined by a filtered listing
    pub max_scan: usize,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            key_prefix: "logbook".to_string(),
            timeout: Duration::from_millis(1500),
            retry_backoff: Duration::from_millis(100),
            max_scan: 1000,
        }
    }
}

/// When a failed call may be sent a second time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Reads: any transport failure
    Always,
    /// Writes: only when the command provably never reached the server
    OnRefusal,
}

#[derive(Debug)]
enum CallError {
    /// Could not obtain a connection; nothing was sent
    Connect(String),
    Redis(RedisError),
    Timeout(Duration),
}

impl CallError {
    fn retryable(&self, retry: Retry) -> bool {
        match (self, retry) {
            (CallError::Connect(_), _) => true,
            (CallError::Redis(err), Retry::OnRefusal) => err.is_connection_refusal(),
            (CallError::Redis(err), Retry::Always) => {
                err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
            }
            (CallError::Timeout(_), Retry::Always) => true,
            (CallError::Timeout(_), Retry::OnRefusal) => false,
        }
    }
}

impl From<CallError> for StoreError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Connect(msg) => StoreError::Unavailable(msg),
            CallError::Redis(err) => err.into(),
            CallError::Timeout(after) => StoreError::Timeout(after),
        }
    }
}

/// Log store persisted in Redis
pub struct RedisStore {
    client: Client,
    conn: OnceCell<ConnectionManager>,
    keys: KeyLayout,
    options: RedisOptions,
}

impl RedisStore {
    /// Create a store for `url`. No connection is made until the first call.
    pub fn open(url: &str, options: RedisOptions) -> Result<Self> {
        let client = Client::open(url)?;
        info!(prefix = %options.key_prefix, "Configured Redis log store");

        Ok(Self {
            client,
            conn: OnceCell::new(),
            keys: KeyLayout::new(options.key_prefix.clone()),
            options,
        })
    }

    pub fn keys(&self) -> &KeyLayout {
        &self.keys
    }

    /// Shared connection, established on first use and reused afterwards.
    /// A failed connect leaves the cell empty so the next call tries again.
    async fn connection(&self) -> std::result::Result<ConnectionManager, CallError> {
        let timeout = self.options.timeout;
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!("Connecting to Redis");
                match tokio::time::timeout(timeout, ConnectionManager::new(self.client.clone())).await
                {
                    Ok(Ok(conn)) => Ok(conn),
                    Ok(Err(err)) => Err(CallError::Connect(err.to_string())),
                    Err(_) => Err(CallError::Connect(format!(
                        "connect timed out after {timeout:?}"
                    ))),
                }
            })
            .await?;
        Ok(conn.clone())
    }

    async fn attempt<T, F, Fut>(&self, f: &F) -> std::result::Result<T, CallError>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        match tokio::time::timeout(self.options.timeout, f(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CallError::Redis(err)),
            Err(_) => Err(CallError::Timeout(self.options.timeout)),
        }
    }

    /// Run `f` under the call timeout, retrying at most once after a backoff
    async fn call<T, F, Fut>(&self, op: &'static str, retry: Retry, f: F) -> Result<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        match self.attempt(&f).await {
            Ok(value) => Ok(value),
            Err(err) if err.retryable(retry) => {
                warn!(
                    op,
                    error = ?err,
                    backoff_ms = self.options.retry_backoff.as_millis() as u64,
                    "Redis call failed, retrying once"
                );
                tokio::time::sleep(self.options.retry_backoff).await;
                self.attempt(&f).await.map_err(|err| {
                    warn!(op, error = ?err, "Redis call failed after retry");
                    err.into()
                })
            }
            Err(err) => {
                warn!(op, error = ?err, "Redis call failed");
                Err(err.into())
            }
        }
    }

    async fn query<T: FromRedisValue>(&self, op: &'static str, cmd: &redis::Cmd) -> Result<T> {
        self.call(op, Retry::Always, |mut conn| async move {
            cmd.query_async(&mut conn).await
        })
        .await
    }

    /// Index ids at newest-first positions `start..start + count`
    async fn index_range(&self, start: usize, count: usize) -> Result<Vec<String>> {
        if count == 0 || start > MAX_INDEX {
            return Ok(Vec::new());
        }

        let stop = start.saturating_add(count - 1).min(MAX_INDEX);
        let mut cmd = redis::cmd("ZREVRANGE");
        cmd.arg(self.keys.index()).arg(start).arg(stop);
        self.query("zrevrange", &cmd).await
    }

    /// Load entry bodies for `ids`, preserving order. Ids whose body is gone
    /// or unreadable are skipped.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<LogEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.keys.entry(id)).collect();
        let mut cmd = redis::cmd("MGET");
        cmd.arg(&keys);
        let bodies: Vec<Option<String>> = self.query("mget", &cmd).await?;

        let mut entries = Vec::with_capacity(bodies.len());
        for (key, body) in keys.iter().zip(bodies) {
            let Some(body) = body else {
                debug!(key = %key, "Indexed entry has no body, skipping");
                continue;
            };
            match serde_json::from_str::<LogEntry>(&body) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(key = %key, error = %err, "Skipping unreadable entry"),
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl IndexSource for RedisStore {
    async fn index_page(
        &self,
        max_score: Option<u64>,
        skip: usize,
        count: usize,
    ) -> Result<Vec<(String, u64)>> {
        let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
        cmd.arg(self.keys.index());
        match max_score {
            Some(score) => cmd.arg(score),
            None => cmd.arg("+inf"),
        };
        cmd.arg("-inf")
            .arg("WITHSCORES")
            .arg("LIMIT")
            .arg(skip)
            .arg(count);

        let members: Vec<(String, f64)> = self.query("zrevrangebyscore", &cmd).await?;
        Ok(members
            .into_iter()
            .map(|(id, score)| (id, score as u64))
            .collect())
    }

    async fn load(&self, ids: &[String]) -> Result<Vec<LogEntry>> {
        self.fetch(ids).await
    }
}

/// Newest-first view of the score index, as read by a filtered scan
#[async_trait]
trait IndexSource: Send + Sync {
    /// Up to `count` members scored at most `max_score` (unbounded when
    /// `None`), newest first, after skipping the first `skip` of them
    async fn index_page(
        &self,
        max_score: Option<u64>,
        skip: usize,
        count: usize,
    ) -> Result<Vec<(String, u64)>>;

    async fn load(&self, ids: &[String]) -> Result<Vec<LogEntry>>;
}

/// Walk the index newest first, keeping entries that match `filter`, until
/// the page is filled or `max_scan` members have been examined. Returns the
/// page and the number of members examined.
///
/// Batches are keyed on score rather than position, so entries appended
/// while the scan runs sit above the cursor and are never read twice.
async fn scan_filtered<S>(
    source: &S,
    filter: &LogFilter,
    page: Page,
    max_scan: usize,
    batch_size: usize,
) -> Result<(Vec<LogEntry>, usize)>
where
    S: IndexSource + ?Sized,
{
    let wanted = page.end();
    let mut matched = Vec::new();
    let mut scanned = 0;
    // Lowest score read so far, and how many members at that score were read
    let mut cursor: Option<u64> = None;
    let mut ties = 0;

    while matched.len() < wanted && scanned < max_scan {
        let count = batch_size.min(max_scan - scanned);
        let members = source.index_page(cursor, ties, count).await?;
        let exhausted = members.len() < count;
        let Some(&(_, last)) = members.last() else {
            break;
        };

        let at_last = members.iter().rev().take_while(|(_, s)| *s == last).count();
        ties = if cursor == Some(last) { ties + at_last } else { at_last };
        cursor = Some(last);
        scanned += members.len();

        let ids: Vec<String> = members.into_iter().map(|(id, _)| id).collect();
        for entry in source.load(&ids).await? {
            if filter.matches(&entry) {
                matched.push(entry);
                if matched.len() == wanted {
                    break;
                }
            }
        }

        if exhausted {
            break;
        }
    }

    let page = matched
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    Ok((page, scanned))
}

#[async_trait]
impl LogStore for RedisStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Durable
    }

    async fn append(&self, entry: &LogEntry) -> Result<()> {
        let body = serde_json::to_string(entry)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(self.keys.entry(&entry.id), body)
            .ignore()
            .zadd(self.keys.index(), &entry.id, entry.score as f64)
            .ignore()
            .incr(self.keys.count(entry.level), 1)
            .ignore()
            .sadd(self.keys.sources(), &entry.source)
            .ignore();

        let pipe = &pipe;
        let _: () = self.call("append", Retry::OnRefusal, |mut conn| async move {
            pipe.query_async(&mut conn).await
        })
        .await?;

        debug!(id = %entry.id, score = entry.score, level = %entry.level, "Appended entry to Redis");
        Ok(())
    }

    async fn list(&self, filter: &LogFilter, page: Page) -> Result<Vec<LogEntry>> {
        if page.limit == 0 {
            return Ok(Vec::new());
        }

        if filter.is_empty() {
            let ids = self.index_range(page.offset, page.limit).await?;
            return self.fetch(&ids).await;
        }

        // Matches never outnumber the members a scan may examine
        if page.offset >= self.options.max_scan {
            return Ok(Vec::new());
        }

        let (entries, scanned) =
            scan_filtered(self, filter, page, self.options.max_scan, SCAN_BATCH).await?;
        debug!(scanned, matched = entries.len(), "Filtered scan of log index");
        Ok(entries)
    }

    async fn counts_by_level(&self) -> Result<LogCounts> {
        let mut cmd = redis::cmd("MGET");
        cmd.arg(self.keys.counts());
        let values: Vec<Option<u64>> = self.query("counts", &cmd).await?;

        let mut counts = LogCounts::default();
        for (level, value) in LogLevel::ALL.iter().zip(values) {
            counts.set(*level, value.unwrap_or(0));
        }
        Ok(counts)
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        let mut cmd = redis::cmd("SMEMBERS");
        cmd.arg(self.keys.sources());
        let members: Vec<String> = self.query("sources", &cmd).await?;
        Ok(members.into_iter().collect())
    }

    async fn ping(&self) -> Result<()> {
        let cmd = redis::cmd("PING");
        let _: String = self.query("ping", &cmd).await?;
        Ok(())
    }
}
