//! Ordering scores and entry stamping
//!
//! The time-ordered index sorts by a numeric score. Wall-clock milliseconds
//! collide for bursts, so each score is `millis * 1000 + tie_breaker` and the
//! clock never hands out the same or a smaller score twice. Scores stay below
//! 2^53, the range Redis sorted sets (IEEE doubles) represent exactly.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use super::types::{LogEntry, NewLogEntry};

/// Slots available per millisecond before scores run ahead of the wall clock
pub const SCORE_SLOTS_PER_MS: u64 = 1000;

/// Strictly increasing score source
#[derive(Debug, Default)]
pub struct ScoreClock {
    last: AtomicU64,
}

impl ScoreClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next score for the current instant
    pub fn next(&self) -> u64 {
        self.next_at(Utc::now().timestamp_millis().max(0) as u64)
    }

    /// Next score given the wall clock in milliseconds
    pub fn next_at(&self, now_ms: u64) -> u64 {
        let floor = now_ms.saturating_mul(SCORE_SLOTS_PER_MS);
        let mut last = self.last.load(Ordering::Relaxed);

        loop {
            let candidate = floor.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Assign id, timestamp and score to a validated entry
    pub fn stamp(&self, new_entry: NewLogEntry) -> LogEntry {
        let score = self.next();

        LogEntry {
            id: Uuid::now_v7().to_string(),
            timestamp: score_timestamp(score),
            score,
            level: new_entry.level,
            message: new_entry.message,
            source: new_entry.source.trim().to_string(),
            user_email: new_entry.user_email.filter(|email| !email.trim().is_empty()),
            details: new_entry.details,
        }
    }
}

/// Externally visible instant of a score
pub fn score_timestamp(score: u64) -> DateTime<Utc> {
    let millis = (score / SCORE_SLOTS_PER_MS) as i64;
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
