//! Wall-clock helpers shared by the pipeline stages.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

/// Resolves a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (DST fall-back) pick the earlier instant. Times inside a
/// spring-forward gap move to the same wall time one hour later, which is
/// after the transition for every zone chrono-tz ships.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }
    if let Some(dt) = tz.from_local_datetime(&(naive + Duration::hours(1))).earliest() {
        return dt;
    }
    // Absolute fallback: interpret as UTC and convert.
    tz.from_utc_datetime(&naive)
}

/// Start of `date` in `tz`.
pub fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    localize(tz, date.and_time(NaiveTime::MIN))
}

/// Start of the calendar day after the one `instant` falls on, in its own zone.
pub fn next_midnight(instant: &DateTime<Tz>) -> DateTime<Tz> {
    let tomorrow = instant.date_naive() + Duration::days(1);
    local_midnight(instant.timezone(), tomorrow)
}

/// Full English day name, e.g. "Monday".
pub const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
