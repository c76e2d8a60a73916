use crate::logs::{LogFilter, LogLevel, NewLogEntry, Page, ValidationError};

use super::models::{LogsQuery, RecordLogRequest};

const MAX_OFFSET: usize = i64::MAX as usize;

/// Turn a record request into a validated entry
pub fn new_entry(request: RecordLogRequest) -> Result<NewLogEntry, ValidationError> {
    let level = request.level.ok_or(ValidationError::MissingField("level"))?;
    let message = request
        .message
        .ok_or(ValidationError::MissingField("message"))?;
    let source = request.source.ok_or(ValidationError::MissingField("source"))?;

    NewLogEntry::parse(&level, message, source, request.user_email, request.details)
}

/// Blank query parameters count as absent
pub fn log_filter(query: &LogsQuery) -> Result<LogFilter, ValidationError> {
    let level = match non_blank(query.level.as_deref()) {
        Some(level) => Some(level.parse::<LogLevel>()?),
        None => None,
    };

    Ok(LogFilter {
        level,
        source: non_blank(query.source.as_deref()).map(str::to_owned),
    })
}

/// Page bounds from the query string. The limit is clamped to `max_limit`;
/// offsets beyond any addressable index position are rejected.
pub fn page(
    query: &LogsQuery,
    default_limit: usize,
    max_limit: usize,
) -> Result<Page, ValidationError> {
    let offset = query.offset.unwrap_or(0);
    if offset > MAX_OFFSET {
        return Err(ValidationError::OffsetOutOfRange(offset));
    }

    let limit = query.limit.unwrap_or(default_limit).min(max_limit);
    Ok(Page::new(limit, offset))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(level: Option<&str>) -> RecordLogRequest {
        RecordLogRequest {
            level: level.map(str::to_owned),
            message: Some("disk full".into()),
            source: Some("backup".into()),
            user_email: None,
            details: Some(json!({"volume": "/dev/sda1"})),
        }
    }

    #[test]
    fn new_entry_accepts_valid_request() {
        let entry = new_entry(request(Some("error"))).unwrap();
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.details, Some(json!({"volume": "/dev/sda1"})));
    }

    #[test]
    fn new_entry_reports_missing_fields_in_order() {
        let err = new_entry(RecordLogRequest::default()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("level")));

        let mut missing_source = request(Some("info"));
        missing_source.source = None;
        let err = new_entry(missing_source).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("source")));
    }

    #[test]
    fn new_entry_rejects_empty_level() {
        let err = new_entry(request(Some(""))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("level")));
    }

    #[test]
    fn log_filter_ignores_blank_parameters() {
        let query = LogsQuery {
            level: Some(" ".into()),
            source: Some("".into()),
            ..LogsQuery::default()
        };
        assert!(log_filter(&query).unwrap().is_empty());
    }

    #[test]
    fn log_filter_rejects_unknown_level() {
        let query = LogsQuery {
            level: Some("fatal".into()),
            ..LogsQuery::default()
        };
        assert!(matches!(
            log_filter(&query),
            Err(ValidationError::UnknownLevel(_))
        ));
    }

    #[test]
    fn page_clamps_limit_and_defaults() {
        let page = page(&LogsQuery::default(), 50, 500).unwrap();
        assert_eq!(page, Page::new(50, 0));

        let query = LogsQuery {
            limit: Some(10_000),
            offset: Some(20),
            ..LogsQuery::default()
        };
        assert_eq!(super::page(&query, 50, 500).unwrap(), Page::new(500, 20));
    }

    #[test]
    fn page_rejects_offset_past_index_range() {
        let query = LogsQuery {
            offset: Some(usize::MAX),
            ..LogsQuery::default()
        };
        assert!(matches!(
            page(&query, 50, 500),
            Err(ValidationError::OffsetOutOfRange(usize::MAX))
        ));
    }
}
