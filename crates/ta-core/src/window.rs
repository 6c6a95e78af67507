//! Analysis window selection and clipping.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::time::local_midnight;
use crate::types::{Period, Segment};

/// Clipped segments this short or shorter are dropped.
pub const MIN_SEGMENT_MS: i64 = 1;

/// Inclusive calendar date range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = ConfigError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }
}

/// The instant range `[start, end)` segments are clipped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl AnalysisWindow {
    /// `[now - period, now]`, expressed in `tz`.
    pub fn from_period(period: Period, now: DateTime<Utc>, tz: Tz) -> Self {
        let end = now.with_timezone(&tz);
        Self {
            start: end - period.duration(),
            end,
        }
    }

    /// From `start` midnight to the midnight after `end`, both in `tz`.
    pub fn from_range(range: DateRange, tz: Tz) -> Self {
        let after_end = range.end.succ_opt().unwrap_or(NaiveDate::MAX);
        Self {
            start: local_midnight(tz, range.start),
            end: local_midnight(tz, after_end),
        }
    }

    /// An explicit range wins over the preset.
    pub fn resolve(period: Period, range: Option<DateRange>, now: DateTime<Utc>, tz: Tz) -> Self {
        range.map_or_else(
            || Self::from_period(period, now, tz),
            |range| Self::from_range(range, tz),
        )
    }

    /// Half-open overlap test: touching the boundary does not count.
    pub fn overlaps(&self, segment: &Segment) -> bool {
        segment.start < self.end && segment.end > self.start
    }

    /// Trims `segment` to the window. `None` when nothing meaningful is left.
    pub fn clip(&self, segment: &Segment) -> Option<Segment> {
        if !self.overlaps(segment) {
            return None;
        }

        let start = segment.start.max(self.start);
        let end = segment.end.min(self.end);
        if end - start <= Duration::milliseconds(MIN_SEGMENT_MS) {
            return None;
        }

        Some(Segment {
            start,
            end,
            ..segment.clone()
        })
    }

    pub fn clip_all(&self, segments: &[Segment]) -> Vec<Segment> {
        segments.iter().filter_map(|s| self.clip(s)).collect()
    }
}
