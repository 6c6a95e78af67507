//! Boundary normalization of raw event times.
//!
//! Every date-only, floating, UTC or zoned value is turned into an aware
//! [`DateTime<Tz>`] here, once, before any interval arithmetic happens.
//! Date-only values start at local midnight in the reporting zone; floating
//! values are read as UTC.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

use crate::ics::{RawEvent, TimeProperty};
use crate::time::{local_midnight, localize, next_midnight};

/// RFC 5545 `DURATION` value, e.g. `PT1H30M`, `P1D`, `P2W`.
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])?P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .unwrap()
});

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Reasons a single event is skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("missing title")]
    MissingTitle,
    #[error("missing start time")]
    MissingStart,
    #[error("missing end time")]
    MissingEnd,
    #[error("invalid time value {value:?}")]
    InvalidTime { value: String },
    #[error("invalid duration {value:?}")]
    InvalidDuration { value: String },
}

/// A typed date or date-time as written in the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// All-day value without a time of day.
    Date(NaiveDate),
    /// Date-time without offset or zone.
    Floating(NaiveDateTime),
    /// Date-time with a trailing `Z`.
    Utc(DateTime<Utc>),
    /// Date-time with a resolvable `TZID`.
    Zoned(NaiveDateTime, Tz),
}

impl EventTime {
    /// Parses a time property.
    ///
    /// Returns the unresolvable `TZID`, if there was one, alongside the value;
    /// such values are read as floating.
    pub fn parse(property: &TimeProperty) -> Result<(Self, Option<String>), EventError> {
        let value = property.value.trim();
        let invalid = || EventError::InvalidTime {
            value: value.to_string(),
        };

        let is_date = property
            .value_type
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
            || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()));
        if is_date {
            let date = NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())?;
            return Ok((Self::Date(date), None));
        }

        if let Some(utc) = value.strip_suffix(['Z', 'z']) {
            let naive = NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT).map_err(|_| invalid())?;
            return Ok((Self::Utc(Utc.from_utc_datetime(&naive)), None));
        }

        let naive = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).map_err(|_| invalid())?;
        match property.tzid.as_deref() {
            None => Ok((Self::Floating(naive), None)),
            Some(tzid) => match resolve_tzid(tzid) {
                Some(tz) => Ok((Self::Zoned(naive, tz), None)),
                None => Ok((Self::Floating(naive), Some(tzid.to_string()))),
            },
        }
    }

    pub const fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Converts to an aware instant. Date-only values become midnight in
    /// `local`.
    pub fn to_instant(self, local: Tz) -> DateTime<Tz> {
        match self {
            Self::Date(date) => local_midnight(local, date),
            Self::Floating(naive) => Tz::UTC.from_utc_datetime(&naive),
            Self::Utc(dt) => dt.with_timezone(&Tz::UTC),
            Self::Zoned(naive, tz) => localize(tz, naive),
        }
    }
}

fn resolve_tzid(tzid: &str) -> Option<Tz> {
    tzid.trim().trim_start_matches('/').parse::<Tz>().ok()
}

/// Parses an RFC 5545 `DURATION` value.
pub fn parse_duration(value: &str) -> Result<Duration, EventError> {
    let invalid = || EventError::InvalidDuration {
        value: value.to_string(),
    };
    let caps = DURATION_RE.captures(value.trim()).ok_or_else(invalid)?;

    let units = [
        (2, 7 * 24 * 3600),
        (3, 24 * 3600),
        (4, 3600),
        (5, 60),
        (6, 1),
    ];
    let mut matched = false;
    let mut seconds: i64 = 0;
    for (group, unit_seconds) in units {
        if let Some(m) = caps.get(group) {
            matched = true;
            let n: i64 = m.as_str().parse().map_err(|_| invalid())?;
            seconds = n
                .checked_mul(unit_seconds)
                .and_then(|s| seconds.checked_add(s))
                .ok_or_else(invalid)?;
        }
    }
    if !matched {
        return Err(invalid());
    }

    let duration = Duration::try_seconds(seconds).ok_or_else(invalid)?;
    Ok(if caps.get(1).is_some_and(|s| s.as_str() == "-") {
        -duration
    } else {
        duration
    })
}

/// A validated calendar event definition with aware start and end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEventSource {
    /// Title exactly as written.
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    /// Raw `RRULE` value.
    pub rule: Option<String>,
    /// Excluded recurrence starts.
    pub exdates: Vec<DateTime<Tz>>,
    /// `TZID`s that could not be resolved and were read as UTC.
    pub unresolved_tzids: Vec<String>,
}

impl CalendarEventSource {
    /// Validates and types a raw event. All-day values are anchored to
    /// midnight in `local`, the zone the run reports in.
    ///
    /// The end is taken from `DTEND`, else `DTSTART + DURATION`, else one day
    /// for all-day events.
    pub fn from_raw(raw: &RawEvent, local: Tz) -> Result<Self, EventError> {
        let title = raw
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(EventError::MissingTitle)?
            .to_string();

        let mut unresolved_tzids = Vec::new();
        let mut read = |property: &TimeProperty| -> Result<EventTime, EventError> {
            let (time, unknown) = EventTime::parse(property)?;
            if let Some(tzid) = unknown {
                if !unresolved_tzids.contains(&tzid) {
                    unresolved_tzids.push(tzid);
                }
            }
            Ok(time)
        };

        let start_time = read(raw.start.as_ref().ok_or(EventError::MissingStart)?)?;
        let start = start_time.to_instant(local);

        let end = match (&raw.end, &raw.duration) {
            (Some(end), _) => read(end)?.to_instant(local),
            (None, Some(duration)) => start + parse_duration(duration)?,
            (None, None) if start_time.is_all_day() => next_midnight(&start),
            (None, None) => return Err(EventError::MissingEnd),
        };

        let mut exdates = Vec::with_capacity(raw.exdates.len());
        for property in &raw.exdates {
            match read(property) {
                Ok(time) => exdates.push(time.to_instant(local)),
                Err(e) => {
                    tracing::debug!(title = %title, error = %e, "ignoring unparsable EXDATE");
                }
            }
        }

        Ok(Self {
            title,
            start,
            end,
            rule: raw.rrule.clone(),
            exdates,
            unresolved_tzids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use chrono_tz::Europe::Berlin;

    fn prop(value: &str) -> TimeProperty {
        TimeProperty {
            value: value.to_string(),
            ..TimeProperty::default()
        }
    }

    fn zoned(value: &str, tzid: &str) -> TimeProperty {
        TimeProperty {
            value: value.to_string(),
            tzid: Some(tzid.to_string()),
            value_type: None,
        }
    }

    fn raw(summary: &str, start: &str, end: &str) -> RawEvent {
        RawEvent {
            summary: Some(summary.to_string()),
            start: Some(prop(start)),
            end: Some(prop(end)),
            ..RawEvent::default()
        }
    }

    #[test]
    fn parses_all_value_shapes() {
        let (date, _) = EventTime::parse(&prop("20240101")).unwrap();
        assert_eq!(date, EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));

        let (utc, _) = EventTime::parse(&prop("20240101T090000Z")).unwrap();
        assert!(matches!(utc, EventTime::Utc(_)));

        let (floating, _) = EventTime::parse(&prop("20240101T090000")).unwrap();
        assert!(matches!(floating, EventTime::Floating(_)));

        let (zoned_time, unknown) =
            EventTime::parse(&zoned("20240101T090000", "America/New_York")).unwrap();
        assert!(matches!(zoned_time, EventTime::Zoned(_, tz) if tz == New_York));
        assert!(unknown.is_none());
    }

    #[test]
    fn value_date_parameter_forces_date() {
        let property = TimeProperty {
            value: "20240315".into(),
            tzid: None,
            value_type: Some("DATE".into()),
        };
        let (time, _) = EventTime::parse(&property).unwrap();
        assert!(time.is_all_day());
    }

    #[test]
    fn unknown_tzid_reads_as_floating() {
        let (time, unknown) =
            EventTime::parse(&zoned("20240101T090000", "Eastern Standard Time")).unwrap();
        assert!(matches!(time, EventTime::Floating(_)));
        assert_eq!(unknown.as_deref(), Some("Eastern Standard Time"));
        assert_eq!(time.to_instant(Tz::UTC).to_rfc3339(), "2024-01-01T09:00:00+00:00");
    }

    #[test]
    fn rejects_garbage_times() {
        assert!(EventTime::parse(&prop("tomorrow")).is_err());
        assert!(EventTime::parse(&prop("20241301T000000Z")).is_err());
    }

    #[test]
    fn date_becomes_local_midnight_and_floating_becomes_utc() {
        let (date, _) = EventTime::parse(&prop("20240101")).unwrap();
        assert_eq!(date.to_instant(Tz::UTC).to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(date.to_instant(Berlin).to_rfc3339(), "2024-01-01T00:00:00+01:00");

        let (floating, _) = EventTime::parse(&prop("20240101T233000")).unwrap();
        assert_eq!(floating.to_instant(Berlin).to_rfc3339(), "2024-01-01T23:30:00+00:00");
    }

    #[test]
    fn zoned_keeps_wall_clock() {
        let (time, _) = EventTime::parse(&zoned("20240701T090000", "America/New_York")).unwrap();
        assert_eq!(time.to_instant(Tz::UTC).to_rfc3339(), "2024-07-01T09:00:00-04:00");
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("PT1H30M").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("P1D").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("P2W").unwrap(), Duration::weeks(2));
        assert_eq!(parse_duration("P1DT2H").unwrap(), Duration::hours(26));
        assert_eq!(parse_duration("-PT15M").unwrap(), Duration::minutes(-15));
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("1 hour").is_err());
    }

    #[test]
    fn from_raw_uses_dtend() {
        let event = raw("Work", "20240101T090000Z", "20240101T110000Z");
        let source = CalendarEventSource::from_raw(&event, Tz::UTC).unwrap();
        assert_eq!(source.title, "Work");
        assert_eq!(source.end - source.start, Duration::hours(2));
    }

    #[test]
    fn from_raw_falls_back_to_duration() {
        let event = RawEvent {
            summary: Some("Call".into()),
            start: Some(prop("20240101T090000Z")),
            duration: Some("PT45M".into()),
            ..RawEvent::default()
        };
        let source = CalendarEventSource::from_raw(&event, Tz::UTC).unwrap();
        assert_eq!(source.end - source.start, Duration::minutes(45));
    }

    #[test]
    fn from_raw_all_day_without_end_lasts_one_day() {
        let event = RawEvent {
            summary: Some("Holiday".into()),
            start: Some(prop("20240101")),
            ..RawEvent::default()
        };
        let source = CalendarEventSource::from_raw(&event, Tz::UTC).unwrap();
        assert_eq!(source.end - source.start, Duration::days(1));
    }

    #[test]
    fn from_raw_all_day_spans_one_local_day() {
        let event = RawEvent {
            summary: Some("Offsite".into()),
            start: Some(prop("20240105")),
            end: Some(prop("20240106")),
            ..RawEvent::default()
        };
        let source = CalendarEventSource::from_raw(&event, Berlin).unwrap();
        assert_eq!(source.start.to_rfc3339(), "2024-01-05T00:00:00+01:00");
        assert_eq!(source.end.to_rfc3339(), "2024-01-06T00:00:00+01:00");
    }

    #[test]
    fn from_raw_all_day_without_end_follows_short_dst_day() {
        // New York springs forward on 2024-03-10.
        let event = RawEvent {
            summary: Some("Holiday".into()),
            start: Some(prop("20240310")),
            ..RawEvent::default()
        };
        let source = CalendarEventSource::from_raw(&event, New_York).unwrap();
        assert_eq!(source.end.to_rfc3339(), "2024-03-11T00:00:00-04:00");
        assert_eq!(source.end - source.start, Duration::hours(23));
    }

    #[test]
    fn from_raw_rejects_missing_fields() {
        let mut event = raw("Work", "20240101T090000Z", "20240101T110000Z");
        event.summary = Some("   ".into());
        assert_eq!(
            CalendarEventSource::from_raw(&event, Tz::UTC),
            Err(EventError::MissingTitle)
        );

        let mut event = raw("Work", "20240101T090000Z", "20240101T110000Z");
        event.start = None;
        assert_eq!(
            CalendarEventSource::from_raw(&event, Tz::UTC),
            Err(EventError::MissingStart)
        );

        let mut event = raw("Work", "20240101T090000Z", "20240101T110000Z");
        event.end = None;
        assert_eq!(
            CalendarEventSource::from_raw(&event, Tz::UTC),
            Err(EventError::MissingEnd)
        );
    }

    #[test]
    fn from_raw_collects_unresolved_tzids_and_exdates() {
        let event = RawEvent {
            summary: Some("Standup".into()),
            start: Some(zoned("20240101T090000", "Nowhere/Special")),
            end: Some(zoned("20240101T091500", "Nowhere/Special")),
            rrule: Some("FREQ=DAILY".into()),
            exdates: vec![prop("20240102T090000Z"), prop("garbage")],
            ..RawEvent::default()
        };
        let source = CalendarEventSource::from_raw(&event, Tz::UTC).unwrap();
        assert_eq!(source.unresolved_tzids, vec!["Nowhere/Special".to_string()]);
        assert_eq!(source.exdates.len(), 1);
        assert_eq!(source.rule.as_deref(), Some("FREQ=DAILY"));
    }
}
