//! Compact duration expressions such as `3d 2h 1m`.

use chrono::{DateTime, NaiveDate, Utc};

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

fn unit_millis(unit: char) -> Option<u64> {
    match unit {
        'd' => Some(DAY_MS),
        'h' => Some(HOUR_MS),
        'm' => Some(MINUTE_MS),
        _ => None,
    }
}

/// Parse a duration expression into milliseconds.
///
/// Every `<digits><unit>` run with a unit of `d`, `h` or `m` adds to the
/// total. Anything else is skipped, so text with no recognised run yields 0.
/// Repeated units accumulate (`"1d 1d"` is two days).
#[must_use]
pub fn parse(text: &str) -> u64 {
    let mut total: u64 = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let Some(first) = c.to_digit(10) else {
            continue;
        };

        let mut value = u64::from(first);
        while let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(u64::from(digit));
            chars.next();
        }

        // A digit run only counts when the very next character is a unit
        if let Some(unit_ms) = chars.peek().copied().and_then(unit_millis) {
            total = total.saturating_add(value.saturating_mul(unit_ms));
            chars.next();
        }
    }

    total
}

/// Parse a duration expression into a `chrono` duration.
///
/// Totals above `i64::MAX` milliseconds are clamped to that value. Such a
/// duration overflows when added to a date, so use [`expires_at`] to turn
/// it into a deadline.
#[must_use]
pub fn parse_chrono(text: &str) -> chrono::Duration {
    let millis = i64::try_from(parse(text)).unwrap_or(i64::MAX);
    chrono::Duration::try_milliseconds(millis).unwrap_or(chrono::Duration::MAX)
}

/// Latest deadline a duration can produce: the end of year 9999.
///
/// Later instants cannot be written as RFC 3339 timestamps.
#[must_use]
pub fn latest_expiry() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map_or(DateTime::<Utc>::MAX_UTC, |at| at.and_utc())
}

/// Deadline `text` after `now`, capped at [`latest_expiry`]
#[must_use]
pub fn expires_at(now: DateTime<Utc>, text: &str) -> DateTime<Utc> {
    let latest = latest_expiry();
    now.checked_add_signed(parse_chrono(text))
        .map_or(latest, |at| at.min(latest))
}
