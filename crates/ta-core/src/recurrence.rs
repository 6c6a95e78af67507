//! Recurrence expansion.
//!
//! Turns one event definition into concrete occurrences up to a horizon.
//! Rule evaluation sits behind [`RecurrenceExpander`] so another evaluator can
//! be substituted; the default [`RuleExpander`] understands a practical subset
//! of RFC 5545 `RRULE`:
//!
//! - `FREQ` = `HOURLY`, `DAILY`, `WEEKLY`, `MONTHLY`, `YEARLY`
//! - `INTERVAL`, `COUNT`, `UNTIL`
//! - `BYDAY` (ordinals honoured for monthly and yearly rules), `BYMONTHDAY`, `BYMONTH`
//!
//! Daily and longer rules walk wall-clock time in the anchor's own zone, so a
//! 09:00 meeting stays at 09:00 local across DST transitions. Hourly rules
//! step in absolute time so a transition neither repeats nor drops an hour.
//!
//! Rules without `COUNT` start walking at the first period that can reach the
//! `from` floor, so an old rule costs no more than a new one.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

use crate::source::CalendarEventSource;
use crate::time::localize;
use crate::types::Occurrence;

/// Upper bound on instances produced from one rule.
pub const MAX_INSTANCES: usize = 100_000;

/// Upper bound on rule periods walked, including periods with no instance.
const MAX_PERIODS: u32 = 200_000;

/// Errors from parsing a recurrence rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("rule has no FREQ")]
    MissingFrequency,
    #[error("unsupported FREQ {0:?}")]
    UnsupportedFrequency(String),
    #[error("invalid {part} value {value:?}")]
    InvalidPart { part: &'static str, value: String },
    #[error("malformed rule part {0:?}")]
    MalformedPart(String),
    #[error("COUNT and UNTIL cannot both be set")]
    CountAndUntil,
}

/// Instance starts produced for one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Ascending.
    pub starts: Vec<DateTime<Tz>>,
    /// A safety limit stopped the walk before the rule or the horizon did.
    pub truncated: bool,
}

/// Rule evaluation capability.
///
/// Implementations return every instance start at or after both `anchor` and
/// `from`, and no later than `horizon`, in ascending order. `COUNT` is
/// counted from `anchor`, including instances earlier than `from`.
pub trait RecurrenceExpander {
    fn expand(
        &self,
        rule: &str,
        anchor: DateTime<Tz>,
        from: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> Result<Expansion, RecurrenceError>;
}

/// The built-in `RRULE` evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleExpander;

impl RecurrenceExpander for RuleExpander {
    fn expand(
        &self,
        rule: &str,
        anchor: DateTime<Tz>,
        from: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> Result<Expansion, RecurrenceError> {
        let rule: RecurrenceRule = rule.parse()?;
        Ok(rule.instances(anchor, from, horizon))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// One `BYDAY` entry, e.g. `MO`, `2TU`, `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByDay {
    pub ordinal: Option<i32>,
    pub weekday: Weekday,
}

/// `UNTIL` bound, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    Date(NaiveDate),
    Floating(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl Until {
    fn admits(&self, candidate: &DateTime<Tz>) -> bool {
        match self {
            Self::Date(date) => candidate.date_naive() <= *date,
            Self::Floating(naive) => candidate.naive_local() <= *naive,
            Self::Utc(utc) => candidate <= utc,
        }
    }
}

/// A parsed `RRULE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<Until>,
    pub by_day: Vec<ByDay>,
    pub by_month_day: Vec<i32>,
    pub by_month: Vec<u32>,
}

impl FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body.strip_prefix("RRULE:").unwrap_or(body);

        let mut frequency = None;
        let mut rule = Self {
            frequency: Frequency::Daily,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
        };

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RecurrenceError::MalformedPart(part.to_string()))?;
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => frequency = Some(parse_frequency(value)?),
                "INTERVAL" => {
                    rule.interval = value
                        .parse()
                        .ok()
                        .filter(|n| *n >= 1)
                        .ok_or_else(|| invalid("INTERVAL", value))?;
                }
                "COUNT" => {
                    rule.count = Some(value.parse().map_err(|_| invalid("COUNT", value))?);
                }
                "UNTIL" => rule.until = Some(parse_until(value)?),
                "BYDAY" => {
                    rule.by_day = split_list(value)
                        .map(parse_by_day)
                        .collect::<Result<_, _>>()?;
                }
                "BYMONTHDAY" => {
                    rule.by_month_day = split_list(value)
                        .map(|v| {
                            v.parse::<i32>()
                                .ok()
                                .filter(|d| *d != 0 && (-31..=31).contains(d))
                                .ok_or_else(|| invalid("BYMONTHDAY", v))
                        })
                        .collect::<Result<_, _>>()?;
                }
                "BYMONTH" => {
                    rule.by_month = split_list(value)
                        .map(|v| {
                            v.parse::<u32>()
                                .ok()
                                .filter(|m| (1..=12).contains(m))
                                .ok_or_else(|| invalid("BYMONTH", v))
                        })
                        .collect::<Result<_, _>>()?;
                }
                other => {
                    tracing::debug!(part = other, "ignoring unsupported RRULE part");
                }
            }
        }

        rule.frequency = frequency.ok_or(RecurrenceError::MissingFrequency)?;
        if rule.count.is_some() && rule.until.is_some() {
            return Err(RecurrenceError::CountAndUntil);
        }
        Ok(rule)
    }
}

fn invalid(part: &'static str, value: &str) -> RecurrenceError {
    RecurrenceError::InvalidPart {
        part,
        value: value.to_string(),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_frequency(value: &str) -> Result<Frequency, RecurrenceError> {
    match value.to_ascii_uppercase().as_str() {
        "HOURLY" => Ok(Frequency::Hourly),
        "DAILY" => Ok(Frequency::Daily),
        "WEEKLY" => Ok(Frequency::Weekly),
        "MONTHLY" => Ok(Frequency::Monthly),
        "YEARLY" => Ok(Frequency::Yearly),
        _ => Err(RecurrenceError::UnsupportedFrequency(value.to_string())),
    }
}

fn parse_until(value: &str) -> Result<Until, RecurrenceError> {
    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(Until::Date)
            .map_err(|_| invalid("UNTIL", value));
    }
    if let Some(utc) = value.strip_suffix(['Z', 'z']) {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .map(|naive| Until::Utc(Utc.from_utc_datetime(&naive)))
            .map_err(|_| invalid("UNTIL", value));
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .map(Until::Floating)
        .map_err(|_| invalid("UNTIL", value))
}

fn parse_by_day(value: &str) -> Result<ByDay, RecurrenceError> {
    let upper = value.to_ascii_uppercase();
    if upper.len() < 2 || !upper.is_char_boundary(upper.len() - 2) {
        return Err(invalid("BYDAY", value));
    }
    let (ordinal, code) = upper.split_at(upper.len() - 2);
    let weekday = match code {
        "MO" => Weekday::Mon,
        "TU" => Weekday::Tue,
        "WE" => Weekday::Wed,
        "TH" => Weekday::Thu,
        "FR" => Weekday::Fri,
        "SA" => Weekday::Sat,
        "SU" => Weekday::Sun,
        _ => return Err(invalid("BYDAY", value)),
    };
    let ordinal = if ordinal.is_empty() {
        None
    } else {
        let n: i32 = ordinal
            .trim_start_matches('+')
            .parse()
            .map_err(|_| invalid("BYDAY", value))?;
        if n == 0 || !(-53..=53).contains(&n) {
            return Err(invalid("BYDAY", value));
        }
        Some(n)
    };
    Ok(ByDay { ordinal, weekday })
}

impl RecurrenceRule {
    /// Instance starts from `anchor` up to and including `horizon`, keeping
    /// only those at or after `from`.
    pub fn instances(
        &self,
        anchor: DateTime<Tz>,
        from: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> Expansion {
        let mut expansion = Expansion::default();
        if self.count == Some(0) {
            return expansion;
        }

        let horizon_date = horizon.with_timezone(&anchor.timezone()).date_naive();
        let mut seen: u32 = 0;
        let mut period = self.first_period(anchor, from);

        for _ in 0..MAX_PERIODS {
            let Some((period_start, candidates)) = self.period_candidates(anchor, period) else {
                return expansion;
            };
            if period_start > horizon_date {
                return expansion;
            }

            for instant in candidates {
                if instant < anchor {
                    continue;
                }
                if instant > horizon {
                    return expansion;
                }
                if self.until.as_ref().is_some_and(|u| !u.admits(&instant)) {
                    return expansion;
                }
                seen = seen.saturating_add(1);
                let exhausted = self.count.is_some_and(|c| seen >= c);
                if instant >= from {
                    expansion.starts.push(instant);
                    if !exhausted && expansion.starts.len() >= MAX_INSTANCES {
                        tracing::warn!(
                            limit = MAX_INSTANCES,
                            "recurrence expansion hit the instance limit"
                        );
                        expansion.truncated = true;
                        return expansion;
                    }
                }
                if exhausted {
                    return expansion;
                }
            }

            let Some(next) = period.checked_add(1) else {
                return expansion;
            };
            period = next;
        }

        tracing::warn!(limit = MAX_PERIODS, "recurrence expansion hit the period limit");
        expansion.truncated = true;
        expansion
    }

    /// Index of the first period worth walking for instances at or after
    /// `from`. Always zero for `COUNT` rules, which must be counted from the
    /// anchor. Lands one period early so candidates late in a period are kept.
    fn first_period(&self, anchor: DateTime<Tz>, from: DateTime<Utc>) -> u32 {
        if self.count.is_some() || from <= anchor {
            return 0;
        }

        let anchor_date = anchor.date_naive();
        let from_date = from.with_timezone(&anchor.timezone()).date_naive();
        let units = match self.frequency {
            Frequency::Hourly => (from - anchor.with_timezone(&Utc)).num_hours(),
            Frequency::Daily => (from_date - anchor_date).num_days(),
            Frequency::Weekly => (from_date - week_start(anchor_date)).num_days() / 7,
            Frequency::Monthly => {
                i64::from(from_date.year() - anchor_date.year()) * 12
                    + i64::from(from_date.month())
                    - i64::from(anchor_date.month())
            }
            Frequency::Yearly => i64::from(from_date.year() - anchor_date.year()),
        };
        let periods = units / i64::from(self.interval) - 1;
        u32::try_from(periods.max(0)).unwrap_or(u32::MAX)
    }

    /// First date of the `period`-th rule period and its candidate starts in
    /// ascending order. `None` once dates overflow.
    fn period_candidates(
        &self,
        anchor: DateTime<Tz>,
        period: u32,
    ) -> Option<(NaiveDate, Vec<DateTime<Tz>>)> {
        let step = i64::from(period) * i64::from(self.interval);
        let tz = anchor.timezone();
        let anchor_date = anchor.date_naive();
        let time = anchor.naive_local().time();
        let at = |date: NaiveDate| localize(tz, date.and_time(time));

        match self.frequency {
            Frequency::Hourly => {
                let instant = anchor.checked_add_signed(Duration::try_hours(step)?)?;
                let date = instant.date_naive();
                let candidates = if self.matches_filters(date) {
                    vec![instant]
                } else {
                    Vec::new()
                };
                Some((date, candidates))
            }
            Frequency::Daily => {
                let date = anchor_date.checked_add_signed(Duration::try_days(step)?)?;
                let candidates = if self.matches_filters(date) {
                    vec![at(date)]
                } else {
                    Vec::new()
                };
                Some((date, candidates))
            }
            Frequency::Weekly => {
                let start = week_start(anchor_date).checked_add_signed(Duration::try_weeks(step)?)?;
                let mut days: Vec<Weekday> = if self.by_day.is_empty() {
                    vec![anchor_date.weekday()]
                } else {
                    self.by_day.iter().map(|d| d.weekday).collect()
                };
                days.sort_by_key(Weekday::num_days_from_monday);
                days.dedup();
                let candidates = days
                    .into_iter()
                    .map(|d| start + Duration::days(i64::from(d.num_days_from_monday())))
                    .filter(|date| self.by_month.is_empty() || self.by_month.contains(&date.month()))
                    .map(at)
                    .collect();
                Some((start, candidates))
            }
            Frequency::Monthly => {
                let first = anchor_date.with_day(1)?;
                let first = first.checked_add_months(Months::new(u32::try_from(step).ok()?))?;
                let candidates = if self.by_month.is_empty() || self.by_month.contains(&first.month())
                {
                    self.month_days(first.year(), first.month(), anchor_date.day())
                        .into_iter()
                        .map(at)
                        .collect()
                } else {
                    Vec::new()
                };
                Some((first, candidates))
            }
            Frequency::Yearly => {
                let year = anchor_date.year().checked_add(i32::try_from(step).ok()?)?;
                let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
                let mut months = if self.by_month.is_empty() {
                    vec![anchor_date.month()]
                } else {
                    self.by_month.clone()
                };
                months.sort_unstable();
                months.dedup();
                let candidates = months
                    .into_iter()
                    .flat_map(|month| self.month_days(year, month, anchor_date.day()))
                    .map(at)
                    .collect();
                Some((first, candidates))
            }
        }
    }

    /// Dates within one month selected by `BYMONTHDAY`/`BYDAY`, or the
    /// anchor's day of month when neither is set.
    fn month_days(&self, year: i32, month: u32, anchor_day: u32) -> Vec<NaiveDate> {
        let Some(last) = last_day_of_month(year, month) else {
            return Vec::new();
        };

        let mut days: Vec<NaiveDate> = if !self.by_month_day.is_empty() {
            self.by_month_day
                .iter()
                .filter_map(|&d| resolve_month_day(year, month, last, d))
                .filter(|date| {
                    self.by_day.is_empty() || self.by_day.iter().any(|b| b.weekday == date.weekday())
                })
                .collect()
        } else if !self.by_day.is_empty() {
            self.by_day
                .iter()
                .flat_map(|by_day| weekdays_in_month(year, month, last, *by_day))
                .collect()
        } else {
            NaiveDate::from_ymd_opt(year, month, anchor_day)
                .into_iter()
                .collect()
        };

        days.sort_unstable();
        days.dedup();
        days
    }

    /// Day-level filters used by hourly and daily rules.
    fn matches_filters(&self, date: NaiveDate) -> bool {
        if !self.by_month.is_empty() && !self.by_month.contains(&date.month()) {
            return false;
        }
        if !self.by_day.is_empty() && !self.by_day.iter().any(|b| b.weekday == date.weekday()) {
            return false;
        }
        if !self.by_month_day.is_empty() {
            let Some(last) = last_day_of_month(date.year(), date.month()) else {
                return false;
            };
            return self
                .by_month_day
                .iter()
                .any(|&d| resolve_month_day(date.year(), date.month(), last, d) == Some(date));
        }
        true
    }
}

/// Monday of the week `date` falls in.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some((next - Duration::days(1)).day())
}

/// Resolves a signed `BYMONTHDAY` (`-1` is the last day).
fn resolve_month_day(year: i32, month: u32, last: u32, day: i32) -> Option<NaiveDate> {
    let last = i32::try_from(last).ok()?;
    let resolved = if day > 0 { day } else { last + day + 1 };
    if !(1..=last).contains(&resolved) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, u32::try_from(resolved).ok()?)
}

fn weekdays_in_month(year: i32, month: u32, last: u32, by_day: ByDay) -> Vec<NaiveDate> {
    let all: Vec<NaiveDate> = (1..=last)
        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .filter(|date| date.weekday() == by_day.weekday)
        .collect();

    match by_day.ordinal {
        None => all,
        Some(n) if n > 0 => usize::try_from(n - 1)
            .ok()
            .and_then(|i| all.get(i).copied())
            .into_iter()
            .collect(),
        Some(n) => usize::try_from(-n)
            .ok()
            .and_then(|back| all.len().checked_sub(back))
            .and_then(|i| all.get(i).copied())
            .into_iter()
            .collect(),
    }
}

/// Occurrences of one event definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedEvent {
    pub occurrences: Vec<Occurrence>,
    /// Expansion stopped at a safety limit.
    pub truncated: bool,
}

/// Expands one event definition into its occurrences.
///
/// Non-recurring sources yield their own interval. Recurring sources yield
/// one occurrence per rule instance up to `horizon`, minus `EXDATE`s, each
/// lasting as long as the source. Instances that end at or before `from` are
/// not produced. Occurrences with `end <= start` are dropped.
pub fn expand_occurrences<E: RecurrenceExpander + ?Sized>(
    source: &CalendarEventSource,
    from: DateTime<Utc>,
    horizon: DateTime<Utc>,
    expander: &E,
) -> Result<ExpandedEvent, RecurrenceError> {
    let duration = source.end - source.start;
    if duration <= Duration::zero() {
        tracing::debug!(title = %source.title, "dropping event with non-positive duration");
        return Ok(ExpandedEvent::default());
    }

    let Some(rule) = source.rule.as_deref() else {
        return Ok(ExpandedEvent {
            occurrences: vec![Occurrence {
                title: source.title.clone(),
                start: source.start,
                end: source.end,
            }],
            truncated: false,
        });
    };

    let expansion = expander.expand(rule, source.start, from - duration, horizon)?;
    let occurrences = expansion
        .starts
        .into_iter()
        .filter(|start| !source.exdates.contains(start))
        .map(|start| Occurrence {
            title: source.title.clone(),
            start,
            end: start + duration,
        })
        .collect();
    Ok(ExpandedEvent {
        occurrences,
        truncated: expansion.truncated,
    })
}
