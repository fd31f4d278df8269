//! UTC calendar-day helpers.

use chrono::{NaiveDate, Utc};

/// The current UTC calendar day.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Whether a calendar day is the current UTC day.
pub fn is_today(day: NaiveDate) -> bool {
    day == today_utc()
}
