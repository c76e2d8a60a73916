//! Reachability probe for the backing services
//!
//! [`HealthProbe::check`] pings the durable log store and the relational
//! store concurrently, each under its own timeout, and never fails: an
//! unreachable backend is reported as `available: false` with the cause.
//! The probe is diagnostic only and does not influence where
//! [`LogService`](crate::logs::LogService) routes entries.

mod postgres;

pub use postgres::PostgresProbe;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::logs::{LogStore, RedisStore};

/// Minimal round trip against a backend
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self) -> Result<(), String>;
}

#[async_trait]
impl Ping for RedisStore {
    async fn ping(&self) -> Result<(), String> {
        LogStore::ping(self).await.map_err(|err| err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub available: bool,
    pub message: String,
}

impl BackendStatus {
    fn up(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
        }
    }

    fn down(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
        }
    }
}

/// Point-in-time availability report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub durable_store: BackendStatus,
    pub relational_store: BackendStatus,
    pub timestamp: DateTime<Utc>,
}

impl ServiceStatus {
    pub fn all_available(&self) -> bool {
        self.durable_store.available && self.relational_store.available
    }
}

pub struct HealthProbe {
    durable: Option<Arc<dyn Ping>>,
    relational: Option<Arc<dyn Ping>>,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(
        durable: Option<Arc<dyn Ping>>,
        relational: Option<Arc<dyn Ping>>,
        timeout: Duration,
    ) -> Self {
        Self {
            durable,
            relational,
            timeout,
        }
    }

    pub async fn check(&self) -> ServiceStatus {
        let (durable_store, relational_store) = tokio::join!(
            probe("durable", self.durable.as_deref(), self.timeout),
            probe("relational", self.relational.as_deref(), self.timeout),
        );

        ServiceStatus {
            durable_store,
            relational_store,
            timestamp: Utc::now(),
        }
    }
}

async fn probe(name: &'static str, backend: Option<&dyn Ping>, timeout: Duration) -> BackendStatus {
    let Some(backend) = backend else {
        return BackendStatus::down("not configured");
    };

    let started = Instant::now();
    match tokio::time::timeout(timeout, backend.ping()).await {
        Ok(Ok(())) => {
            let elapsed_ms = started.elapsed().as_millis();
            debug!(backend = name, elapsed_ms = elapsed_ms as u64, "Backend reachable");
            BackendStatus::up(format!("reachable in {elapsed_ms} ms"))
        }
        Ok(Err(cause)) => {
            warn!(backend = name, %cause, "Backend unreachable");
            BackendStatus::down(cause)
        }
        Err(_) => {
            warn!(backend = name, timeout_ms = timeout.as_millis() as u64, "Backend ping timed out");
            BackendStatus::down(format!("timed out after {} ms", timeout.as_millis()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::RedisOptions;

    struct Up;
    struct Down(&'static str);
    struct Hang;

    #[async_trait]
    impl Ping for Up {
        async fn ping(&self) -> Result<(), String> {
            Ok(())
        }
    }

    #[async_trait]
    impl Ping for Down {
        async fn ping(&self) -> Result<(), String> {
            Err(self.0.to_string())
        }
    }

    #[async_trait]
    impl Ping for Hang {
        async fn ping(&self) -> Result<(), String> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_both_backends_up() {
        let probe = HealthProbe::new(
            Some(Arc::new(Up)),
            Some(Arc::new(Up)),
            Duration::from_millis(200),
        );

        let status = probe.check().await;
        assert!(status.all_available());
        assert!(status.durable_store.message.starts_with("reachable"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let probe = HealthProbe::new(
            Some(Arc::new(Down("NOAUTH Authentication required"))),
            Some(Arc::new(Up)),
            Duration::from_millis(200),
        );

        let status = probe.check().await;
        assert!(!status.durable_store.available);
        assert_eq!(status.durable_store.message, "NOAUTH Authentication required");
        assert!(status.relational_store.available);
    }

    #[tokio::test]
    async fn test_unreachable_redis_with_reachable_database() {
        let redis = RedisStore::open(
            "redis://127.0.0.1:1/",
            RedisOptions {
                timeout: Duration::from_millis(200),
                retry_backoff: Duration::from_millis(10),
                ..RedisOptions::default()
            },
        )
        .unwrap();
        let timeout = Duration::from_millis(300);
        let probe = HealthProbe::new(Some(Arc::new(redis)), Some(Arc::new(Up)), timeout);

        let started = Instant::now();
        let status = probe.check().await;

        assert!(!status.durable_store.available);
        assert!(status.relational_store.available);
        assert!(started.elapsed() < timeout + Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_hanging_backends_are_probed_concurrently() {
        let timeout = Duration::from_millis(250);
        let probe = HealthProbe::new(Some(Arc::new(Hang)), Some(Arc::new(Hang)), timeout);

        let started = Instant::now();
        let status = probe.check().await;
        let elapsed = started.elapsed();

        assert!(!status.durable_store.available);
        assert!(!status.relational_store.available);
        assert!(status.relational_store.message.starts_with("timed out"));
        assert!(elapsed < timeout * 2 - Duration::from_millis(50), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_unconfigured_backends() {
        let probe = HealthProbe::new(None, None, Duration::from_millis(100));
        let status = probe.check().await;

        assert_eq!(status.durable_store, BackendStatus::down("not configured"));
        assert_eq!(status.relational_store, BackendStatus::down("not configured"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ServiceStatus {
            durable_store: BackendStatus::down("refused"),
            relational_store: BackendStatus::up("reachable in 3 ms"),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["durableStore"]["available"], false);
        assert_eq!(value["relationalStore"]["available"], true);
        assert!(value.get("timestamp").is_some());
    }
}
