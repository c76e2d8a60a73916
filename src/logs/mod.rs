//! Activity-log storage
//!
//! Application code records and queries entries through [`LogService`]. It
//! wraps two [`LogStore`] variants:
//!
//! - [`RedisStore`]: the durable store. Entry bodies, a score-ordered index,
//!   per-level counters and the source set live in Redis.
//! - [`MemoryStore`]: a bounded, process-local fallback used while Redis is
//!   unreachable. It does not survive restarts.
//!
//! Every entry is also written to an [`AuditSink`] before any store is
//! attempted, so an entry that no store accepts still leaves a trace in the
//! process log.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logbook::logs::{LogLevel, LogService, NewLogEntry, RedisStore, RedisOptions};
//!
//! let durable = RedisStore::open("redis://127.0.0.1/", RedisOptions::default())?;
//! let service = LogService::builder().durable(Arc::new(durable)).build();
//!
//! let entry = NewLogEntry::builder()
//!     .level(LogLevel::Info)
//!     .message("user signed in")
//!     .source("auth")
//!     .build();
//! let recorded = service.record(entry).await?;
//! ```

pub mod clock;
pub mod durable;
pub mod error;
pub mod keys;
pub mod memory;
pub mod service;
pub mod sink;
pub mod store;
pub mod types;

pub use clock::ScoreClock;
pub use durable::{RedisOptions, RedisStore};
pub use error::{LogError, StoreError, ValidationError};
pub use keys::KeyLayout;
pub use memory::{DEFAULT_MEMORY_CAPACITY, MemoryStore};
pub use service::{LogService, LogStatus, Recorded, Served};
pub use sink::{AuditSink, TracingSink};
pub use store::{LogStore, StoreKind};
pub use types::{LogCounts, LogEntry, LogFilter, LogLevel, NewLogEntry, Page};
