//! Observability: tracing subscriber setup and in-process counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::TelemetryConfig;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(telemetry: &TelemetryConfig) -> Result<(), AnyError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if telemetry.json_logs {
        registry.with(fmt::layer().json().with_target(true)).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }

    Ok(())
}

/// Counters for the record and query paths
#[derive(Debug, Default)]
pub struct Metrics {
    entries_recorded: AtomicU64,
    entries_fallback: AtomicU64,
    record_failures: AtomicU64,
    query_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_recorded(&self) {
        self.entries_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "entries_recorded", "Metric incremented");
    }

    pub fn entry_fallback(&self) {
        self.entries_fallback.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "entries_fallback", "Metric incremented");
    }

    pub fn record_failed(&self) {
        self.record_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "record_failures", "Metric incremented");
    }

    pub fn query_failed(&self) {
        self.query_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "query_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_recorded: self.entries_recorded.load(Ordering::Relaxed),
            entries_fallback: self.entries_fallback.load(Ordering::Relaxed),
            record_failures: self.record_failures.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub entries_recorded: u64,
    pub entries_fallback: u64,
    pub record_failures: u64,
    pub query_failures: u64,
}
