//! Overdue-day derivation.
//!
//! `overdue_days` is a computed view, never a column: it is recomputed at
//! every read boundary (listing, patch response) from the current UTC date.
//! Day arithmetic happens on UTC calendar dates, so flooring is deterministic
//! regardless of the timezone the remote timestamps carried.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Days after creation an item falls due when it has no explicit due date.
pub const DUE_FALLBACK_DAYS: i64 = 14;

/// Parse an ISO-8601-ish date string into a UTC calendar date.
///
/// Accepts full RFC 3339 timestamps, naive timestamps missing a timezone,
/// and bare `YYYY-MM-DD` dates. Anything else is `None`.
pub fn parse_loose_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// The date an item is effectively due.
///
/// An explicit due date wins; otherwise the item falls due
/// [`DUE_FALLBACK_DAYS`] after creation. `None` when neither parses.
pub fn effective_due_date(due_at: &str, created_at: &str) -> Option<NaiveDate> {
    if let Some(due) = parse_loose_date(due_at) {
        return Some(due);
    }
    parse_loose_date(created_at).map(|created| created + Duration::days(DUE_FALLBACK_DAYS))
}

/// Signed whole days between `today` and the effective due date.
///
/// Positive means overdue; zero or negative means on track. Returns 0 when
/// no usable date exists. The fallback-creation path shares the same
/// arithmetic as the explicit-due path.
pub fn overdue_days(due_at: &str, created_at: &str, today: NaiveDate) -> i64 {
    match effective_due_date(due_at, created_at) {
        Some(target) => (today - target).num_days(),
        None => 0,
    }
}

/// Today's UTC calendar date.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
