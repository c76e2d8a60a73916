use super::models::Config;
use thiserror::Error;

/// Largest request body the API will accept regardless of configuration
const MAX_PAYLOAD_CEILING: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid {field} scheme '{scheme}', expected one of {expected}")]
    InvalidUrlScheme {
        field: &'static str,
        scheme: String,
        expected: &'static str,
    },

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("default_limit ({default_limit}) exceeds max_limit ({max_limit})")]
    DefaultLimitExceedsMax {
        default_limit: usize,
        max_limit: usize,
    },

    #[error("max_payload_bytes ({actual}) exceeds limit of 5MB ({limit})")]
    PayloadSizeExceedsLimit { actual: u64, limit: u64 },

    #[error("Redis key prefix must be non-empty and contain no whitespace: '{0}'")]
    InvalidKeyPrefix(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_urls(config)?;
    validate_api_limits(config)?;
    validate_redis(config)?;
    validate_timeouts(config)?;
    Ok(())
}

fn validate_urls(config: &Config) -> Result<(), ValidationError> {
    if let Some(url) = &config.redis.url {
        check_scheme("REDIS_URL", url, &["redis", "rediss", "unix", "redis+unix"], "redis://, rediss://, unix://")?;
    }
    if let Some(url) = &config.database.url {
        check_scheme("DATABASE_URL", url, &["postgres", "postgresql"], "postgres://, postgresql://")?;
    }
    Ok(())
}

fn check_scheme(
    field: &'static str,
    url: &str,
    allowed: &[&str],
    expected: &'static str,
) -> Result<(), ValidationError> {
    let scheme = url.split_once("://").map(|(scheme, _)| scheme).unwrap_or("");
    if allowed.contains(&scheme) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrlScheme {
            field,
            scheme: scheme.to_string(),
            expected,
        })
    }
}

fn validate_api_limits(config: &Config) -> Result<(), ValidationError> {
    let api = &config.server.api;

    let payload = api.max_payload_bytes.as_u64();
    if payload == 0 {
        return Err(ValidationError::NotPositive {
            field: "server.api.max_payload_bytes",
        });
    }
    if payload > MAX_PAYLOAD_CEILING {
        return Err(ValidationError::PayloadSizeExceedsLimit {
            actual: payload,
            limit: MAX_PAYLOAD_CEILING,
        });
    }

    if api.default_limit == 0 {
        return Err(ValidationError::NotPositive {
            field: "server.api.default_limit",
        });
    }
    if api.default_limit > api.max_limit {
        return Err(ValidationError::DefaultLimitExceedsMax {
            default_limit: api.default_limit,
            max_limit: api.max_limit,
        });
    }

    Ok(())
}

fn validate_redis(config: &Config) -> Result<(), ValidationError> {
    let prefix = &config.redis.key_prefix;
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidKeyPrefix(prefix.clone()));
    }
    if config.redis.max_scan == 0 {
        return Err(ValidationError::NotPositive {
            field: "redis.max_scan",
        });
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("redis.timeout_ms", config.redis.timeout_ms),
        ("database.timeout_ms", config.database.timeout_ms),
        ("health.timeout_ms", config.health.timeout_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(ValidationError::NotPositive { field });
        }
    }
    if config.database.max_connections == 0 {
        return Err(ValidationError::NotPositive {
            field: "database.max_connections",
        });
    }
    Ok(())
}
