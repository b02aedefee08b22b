use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;

/// Returns today's date in the configured timezone.
///
/// Booking expiries are calendar dates in the makerspace's local time.
pub fn today_local(tz: &Tz) -> NaiveDate {
    Utc::now().with_timezone(tz).date_naive()
}

/// Returns the current instant; sessions are tracked in UTC.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Whole days from `today` until `date` (negative once `date` has passed).
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Adds a non-negative number of days, saturating at the calendar's end.
pub fn add_days(date: NaiveDate, days: i32) -> NaiveDate {
    date.checked_add_days(Days::new(days.max(0) as u64))
        .unwrap_or(NaiveDate::MAX)
}
