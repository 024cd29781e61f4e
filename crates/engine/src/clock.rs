//! Delay arithmetic and counter-reset boundaries.
//!
//! Pure time math, generic over the time zone so production code passes
//! `chrono::Local` and tests pass fixed UTC instants. Day boundaries are
//! local-date changes; week boundaries follow the ISO week (Monday
//! start).

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::workflow::DelayData;

/// Current Unix time in whole seconds — the unit of `execute_after`.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Convert an edge delay to milliseconds.
///
/// Malformed amounts and unknown units count as no delay.
pub fn delay_to_ms(delay: &DelayData) -> i64 {
    let amount: i64 = match delay.delay.trim().parse() {
        Ok(n) if n >= 0 => n,
        _ => return 0,
    };
    let unit_ms: i64 = match delay.unit.as_str() {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return 0,
    };
    amount.saturating_mul(unit_ms)
}

/// Has the calendar date advanced since `last`?
pub fn crossed_day_boundary<Tz: TimeZone>(last: &DateTime<Tz>, now: &DateTime<Tz>) -> bool {
    now > last && now.date_naive() != last.date_naive()
}

/// Has a new ISO week begun since `last`? A new week starts when the ISO
/// year advances or the week number increases within the same ISO year.
pub fn crossed_week_boundary<Tz: TimeZone>(last: &DateTime<Tz>, now: &DateTime<Tz>) -> bool {
    if now <= last {
        return false;
    }
    let last_week = last.iso_week();
    let now_week = now.iso_week();
    now_week.year() > last_week.year()
        || (now_week.year() == last_week.year() && now_week.week() > last_week.week())
}

/// 00:00 on the following calendar day.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let date = now.date_naive().succ_opt().unwrap_or_else(|| now.date_naive());
    at_midnight(date, &now.timezone())
}

/// 00:00 on the next Monday (always strictly in the future).
pub fn next_week_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let days_ahead = 7 - i64::from(now.weekday().num_days_from_monday());
    let date = now.date_naive() + Duration::days(days_ahead);
    at_midnight(date, &now.timezone())
}

fn at_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(dt, _) => dt,
        // A DST gap swallowed midnight; the hour after is always valid.
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}
