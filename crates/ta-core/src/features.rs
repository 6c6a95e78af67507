//! Per-segment feature derivation.

use std::collections::HashSet;

use chrono::{Datelike, Weekday};

use crate::types::{DayType, FeatureRecord, Segment};

/// Settings for [`tag_segment`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    weekdays: HashSet<Weekday>,
    focus_categories: HashSet<String>,
    focus_minutes: f64,
}

impl FeatureConfig {
    /// Focus categories are lowercased and trimmed here so lookups match the
    /// classifier's output.
    pub fn new<S: AsRef<str>>(
        weekdays: HashSet<Weekday>,
        focus_categories: &[S],
        focus_minutes: f64,
    ) -> Self {
        Self {
            weekdays,
            focus_categories: focus_categories
                .iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .collect(),
            focus_minutes,
        }
    }

    pub fn day_type(&self, day: Weekday) -> DayType {
        if self.weekdays.contains(&day) {
            DayType::Weekday
        } else {
            DayType::Weekend
        }
    }

    /// Both conditions must hold.
    pub fn is_focus(&self, category: &str, duration_minutes: f64) -> bool {
        self.focus_categories.contains(&category.to_lowercase())
            && duration_minutes >= self.focus_minutes
    }
}

/// Derives the output row for a localized, clipped segment.
///
/// Date fields come from `start`'s wall clock in the segment's own zone.
#[allow(clippy::cast_precision_loss)]
pub fn tag_segment(segment: Segment, config: &FeatureConfig) -> FeatureRecord {
    let duration_minutes = segment.duration().num_milliseconds() as f64 / 60_000.0;
    let date = segment.start.date_naive();
    let day_of_week = date.weekday();

    FeatureRecord {
        date,
        day_of_week,
        day_type: config.day_type(day_of_week),
        duration_minutes,
        is_focus_session: config.is_focus(&segment.category, duration_minutes),
        segment,
    }
}
