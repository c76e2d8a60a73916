use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, header::CONTENT_TYPE},
};
use chrono::Utc;
use tracing::{debug, warn};

use super::{
    error::ApiError,
    models::{
        HealthResponse, LogsQuery, LogsResponse, LogsStatusResponse, RecordLogRequest,
        RecordLogResponse, fallback_flag,
    },
    state::AppState,
    utils, validation,
};
use crate::health::ServiceStatus;
use crate::logs::{LogError, LogStatus, ValidationError};

const CONSOLE_ONLY_NOTICE: &str =
    "entry could not be stored and was written to the console audit trail only";

/// Record an activity-log entry (POST /api/record-log)
///
/// Storage trouble never fails the request: entries go to the in-memory
/// store while Redis is down (`fallback: true`), and when no store accepts
/// the entry the response still succeeds with a `notice`. Only malformed
/// input is rejected.
pub async fn record_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Json<RecordLogResponse>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    utils::parse_content_type(content_type)?;

    let limit = state.config.server.api.max_payload_bytes.as_usize();
    let body_bytes = utils::read_limited(body, limit).await?;

    let request: RecordLogRequest = serde_json::from_slice(&body_bytes)
        .map_err(|err| ValidationError::Malformed(err.to_string()))?;
    let new_entry = validation::new_entry(request)?;

    let response = match state.logs.record(new_entry).await {
        Ok(recorded) => RecordLogResponse {
            success: true,
            fallback: fallback_flag(recorded.is_fallback()),
            data: recorded.entry,
            notice: None,
        },
        Err(LogError::FallbackExhausted { entry, reason }) => {
            warn!(id = %entry.id, %reason, "Entry kept in audit trail only");
            RecordLogResponse {
                success: true,
                data: *entry,
                fallback: None,
                notice: Some(CONSOLE_ONLY_NOTICE.to_string()),
            }
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(response))
}

/// Per-level counts and known sources (GET /api/logs-status)
pub async fn logs_status(
    State(state): State<AppState>,
) -> Result<Json<LogsStatusResponse>, ApiError> {
    let served = state.logs.status().await?;
    let fallback = fallback_flag(served.is_fallback());
    let LogStatus {
        counts,
        sources,
        total,
    } = served.value;

    Ok(Json(LogsStatusResponse {
        counts,
        sources,
        total,
        timestamp: Utc::now(),
        fallback,
    }))
}

/// Newest-first listing (GET /api/logs?level=&source=&limit=&offset=)
pub async fn list_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(query) = query.map_err(|err| ValidationError::Malformed(err.body_text()))?;
    let filter = validation::log_filter(&query)?;

    let limits = &state.config.server.api;
    let page = validation::page(&query, limits.default_limit, limits.max_limit)?;
    debug!(?filter, limit = page.limit, offset = page.offset, "Listing entries");

    let served = state.logs.query(&filter, page).await?;
    let fallback = fallback_flag(served.is_fallback());

    Ok(Json(LogsResponse {
        data: served.value,
        fallback,
    }))
}

/// Backend reachability (GET /api/service-status); always 200
pub async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.probe.check().await)
}

/// Liveness (GET /health)
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        metrics: state.metrics.snapshot(),
    })
}
