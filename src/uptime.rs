//! Elapsed-time formatting for the `/uptime` command.
//!
//! Produces a calendar-aware breakdown (months are months, not 30-day
//! blocks) with Russian labels, omitting zero-valued components.

use chrono::{DateTime, Months, Utc};

const LABELS: [&str; 6] = ["Лет", "Месяцев", "Дней", "Часов", "Минут", "Секунд"];

const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_MINUTE: i64 = 60;

/// Breakdown of the span between `start` and `now`, e.g. "Часов: 1 Минут: 30".
///
/// Zero-valued components are never rendered; an empty string means the span
/// is under a second (or `now` precedes `start`).
#[must_use]
pub fn human_breakdown(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now <= start {
        return String::new();
    }

    // Walk whole calendar months forward from `start`, then split the
    // remainder as a plain duration.
    let mut months: u32 = 0;
    while start
        .checked_add_months(Months::new(months + 1))
        .is_some_and(|anchored| anchored <= now)
    {
        months += 1;
    }
    let anchored = start
        .checked_add_months(Months::new(months))
        .unwrap_or(start);

    let secs = (now - anchored).num_seconds();
    let values = [
        i64::from(months / 12),
        i64::from(months % 12),
        secs / SECS_PER_DAY,
        (secs % SECS_PER_DAY) / SECS_PER_HOUR,
        (secs % SECS_PER_HOUR) / SECS_PER_MINUTE,
        secs % SECS_PER_MINUTE,
    ];

    LABELS
        .iter()
        .zip(values)
        .filter(|(_, amount)| *amount != 0)
        .map(|(label, amount)| format!("{label}: {amount}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid date")
    }

    #[test]
    fn test_ninety_minutes_renders_hours_and_minutes_only() {
        let start = utc(2024, 3, 1, 12, 0, 0);
        let now = start + chrono::Duration::minutes(90);
        assert_eq!(human_breakdown(start, now), "Часов: 1 Минут: 30");
    }

    #[test]
    fn test_full_breakdown() {
        let start = utc(2020, 1, 1, 0, 0, 0);
        let now = utc(2021, 2, 2, 3, 4, 5);
        assert_eq!(
            human_breakdown(start, now),
            "Лет: 1 Месяцев: 1 Дней: 1 Часов: 3 Минут: 4 Секунд: 5"
        );
    }

    #[test]
    fn test_calendar_month_is_not_thirty_days() {
        // Feb 1 -> Mar 1 is exactly one month even though it is 29 days in 2024
        let start = utc(2024, 2, 1, 0, 0, 0);
        let now = utc(2024, 3, 1, 0, 0, 0);
        assert_eq!(human_breakdown(start, now), "Месяцев: 1");
    }

    #[test]
    fn test_seconds_only() {
        let start = utc(2024, 3, 1, 12, 0, 0);
        let now = start + chrono::Duration::seconds(42);
        assert_eq!(human_breakdown(start, now), "Секунд: 42");
    }

    #[test]
    fn test_zero_span_is_empty() {
        let start = utc(2024, 3, 1, 12, 0, 0);
        assert_eq!(human_breakdown(start, start), "");
    }

    #[test]
    fn test_backwards_span_is_empty() {
        let start = utc(2024, 3, 1, 12, 0, 0);
        let now = start - chrono::Duration::minutes(5);
        assert_eq!(human_breakdown(start, now), "");
    }
}
