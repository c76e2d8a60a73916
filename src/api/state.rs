use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::health::{HealthProbe, Ping, PostgresProbe};
use crate::logs::{LogService, LogStore, MemoryStore, RedisStore};
use crate::observability::Metrics;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub logs: Arc<LogService>,
    pub probe: Arc<HealthProbe>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, logs: LogService, probe: HealthProbe) -> Self {
        let metrics = logs.metrics().clone();
        Self {
            config: Arc::new(config),
            logs: Arc::new(logs),
            probe: Arc::new(probe),
            metrics,
        }
    }

    /// Build every client once. Nothing is dialed here: Redis and PostgreSQL
    /// connect on first use, so the service starts while they are down.
    pub fn from_config(config: Config) -> Result<Self, AnyError> {
        let memory = Arc::new(MemoryStore::new(config.memory.capacity));

        let durable: Option<Arc<dyn LogStore>> = match &config.redis.url {
            Some(url) => {
                info!(prefix = %config.redis.key_prefix, "Using Redis as durable log store");
                Some(Arc::new(RedisStore::open(url, config.redis.options())?))
            }
            None => {
                warn!("REDIS_URL not set, entries are kept in memory only");
                None
            }
        };

        let logs = LogService::builder()
            .maybe_durable(durable)
            .memory(memory)
            .build();

        let probe = health_probe(&config)?;
        Ok(Self::new(config, logs, probe))
    }
}

/// The probe owns its own clients so it reports reachability independently
/// of where the log service currently routes entries
fn health_probe(config: &Config) -> Result<HealthProbe, AnyError> {
    let durable: Option<Arc<dyn Ping>> = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisStore::open(url, config.redis.options())?)),
        None => None,
    };

    let relational: Option<Arc<dyn Ping>> = match &config.database.url {
        Some(url) => Some(Arc::new(PostgresProbe::connect_lazy(
            url,
            config.database.max_connections,
            Duration::from_millis(config.database.timeout_ms),
        )?)),
        None => None,
    };

    Ok(HealthProbe::new(durable, relational, config.health.timeout()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_without_backends() {
        let state = AppState::from_config(Config::default()).unwrap();

        assert!(!state.logs.has_durable_store());
        let status = state.probe.check().await;
        assert_eq!(status.durable_store.message, "not configured");
        assert_eq!(status.relational_store.message, "not configured");
    }

    #[tokio::test]
    async fn test_from_config_does_not_dial() {
        let mut config = Config::default();
        config.redis.url = Some("redis://127.0.0.1:1/".to_string());
        config.database.url = Some("postgres://app@127.0.0.1:1/app".to_string());

        let state = AppState::from_config(config).unwrap();
        assert!(state.logs.has_durable_store());
    }
}
