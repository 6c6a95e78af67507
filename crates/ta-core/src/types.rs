//! Core record types carried between pipeline stages.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Unknown preset period label.
    #[error("invalid period: {value} (expected one of 1w, 2w, 1m, 3m, 6m, 1y, 2y, 5y)")]
    InvalidPeriod { value: String },
}

/// Named analysis period, counted back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "2w")]
    TwoWeeks,
    #[default]
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Period {
    /// All presets, shortest first.
    pub const ALL: [Self; 8] = [
        Self::OneWeek,
        Self::TwoWeeks,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::FiveYears,
    ];

    /// Number of days the preset covers.
    #[must_use]
    pub const fn days(self) -> i64 {
        match self {
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 182,
            Self::OneYear => 365,
            Self::TwoYears => 730,
            Self::FiveYears => 1825,
        }
    }

    /// Short label used on the command line and in config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneWeek => "1w",
            Self::TwoWeeks => "2w",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
        }
    }

    pub fn duration(self) -> Duration {
        Duration::days(self.days())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(ValidationError::InvalidPeriod { value: s })
    }
}

/// Whether a date falls inside the configured work week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Weekday => "Weekday",
            Self::Weekend => "Weekend",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subcategory label used when a title carries no subcategory text.
pub const NO_SUBCATEGORY: &str = "no subcategory";

/// One weighted share of an event's time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcategoryAllocation {
    pub name: String,
    /// Percentage of the parent interval, in `(0, 100]`.
    pub weight_percent: f64,
}

impl SubcategoryAllocation {
    /// The single allocation used when no subcategory text is present.
    pub fn unspecified() -> Self {
        Self {
            name: NO_SUBCATEGORY.to_string(),
            weight_percent: 100.0,
        }
    }
}

/// One concrete instance of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl Occurrence {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A contiguous single-day, single-subcategory slice of an occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    /// Lowercased, trimmed.
    pub category: String,
    /// Lowercased, trimmed.
    pub subcategory: String,
    /// The event title exactly as it appeared in the calendar.
    pub title: String,
}

impl Segment {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A clipped, localized segment with its derived features. One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub segment: Segment,
    pub date: NaiveDate,
    pub day_of_week: Weekday,
    pub day_type: DayType,
    pub duration_minutes: f64,
    pub is_focus_session: bool,
}

/// A condition the pipeline recovered from. Never stops a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The event contributed no segments.
    #[error("skipped event #{index} ({title}): {reason}")]
    SkippedEvent {
        /// Position of the event in the document, starting at 1.
        index: usize,
        title: String,
        reason: String,
    },

    /// The target timezone could not be resolved; UTC was used instead.
    #[error("unknown timezone {0:?}, falling back to UTC")]
    UnknownTimezone(String),

    /// An event time carried a TZID chrono-tz does not know; read as UTC.
    #[error("event #{index} uses unknown TZID {tzid:?}, read as UTC")]
    UnknownEventTimezone { index: usize, tzid: String },

    /// Recurrence expansion stopped at a safety limit; later instances are missing.
    #[error("event #{index} ({title}) recurs too often, later occurrences were dropped")]
    ExpansionTruncated { index: usize, title: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_from_str() {
        assert_eq!("1w".parse::<Period>().unwrap(), Period::OneWeek);
        assert_eq!("5Y".parse::<Period>().unwrap(), Period::FiveYears);
        assert!("4w".parse::<Period>().is_err());
    }

    #[test]
    fn period_days_match_presets() {
        let days: Vec<i64> = Period::ALL.iter().map(|p| p.days()).collect();
        assert_eq!(days, vec![7, 14, 30, 90, 182, 365, 730, 1825]);
    }

    #[test]
    fn period_label_roundtrip() {
        for period in Period::ALL {
            let parsed: Period = period.to_string().parse().expect("should parse");
            assert_eq!(parsed, period);
        }
    }

    #[test]
    fn period_default_is_one_month() {
        assert_eq!(Period::default(), Period::OneMonth);
    }

    #[test]
    fn warning_messages() {
        let w = Warning::UnknownTimezone("Mars/Olympus".into());
        assert_eq!(
            w.to_string(),
            "unknown timezone \"Mars/Olympus\", falling back to UTC"
        );

        let w = Warning::SkippedEvent {
            index: 3,
            title: "Gym".into(),
            reason: "missing end time".into(),
        };
        assert_eq!(w.to_string(), "skipped event #3 (Gym): missing end time");

        let w = Warning::ExpansionTruncated {
            index: 2,
            title: "Ping".into(),
        };
        assert_eq!(
            w.to_string(),
            "event #2 (Ping) recurs too often, later occurrences were dropped"
        );
    }
}
