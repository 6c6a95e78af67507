//! Pipeline configuration.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureConfig;
use crate::types::Period;
use crate::window::DateRange;

/// Default recurrence lookahead in days.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 730;

/// Invalid configuration, detected before the pipeline runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("{which} delimiter must not be empty")]
    EmptyDelimiter { which: &'static str },

    #[error("unknown weekday name {0:?}")]
    UnknownWeekday(String),

    #[error("focus threshold must be a non-negative number of minutes, got {0}")]
    InvalidFocusMinutes(f64),

    #[error("recurrence lookahead must be at least one day, got {0}")]
    InvalidLookahead(i64),
}

/// Everything a pipeline run needs besides the document and the clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Separates the category from the subcategory text. Only the first match counts.
    pub category_delimiter: String,

    /// Separates subcategory tokens.
    pub subcategory_delimiter: String,

    /// Day names counted as weekdays; everything else is weekend.
    pub weekdays: Vec<String>,

    /// Categories (case-insensitive) that can form focus sessions.
    pub focus_categories: Vec<String>,

    /// Minimum segment length in minutes for a focus session.
    pub focus_minutes: f64,

    /// IANA identifier of the reporting timezone.
    pub timezone: String,

    /// Preset window, used when `date_range` is unset.
    pub period: Period,

    /// Explicit inclusive date range. Takes precedence over `period`.
    pub date_range: Option<DateRange>,

    /// How far past "now" recurrence rules are expanded.
    pub recurrence_lookahead_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            category_delimiter: ":".to_string(),
            subcategory_delimiter: "-".to_string(),
            weekdays: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .map(String::from)
                .to_vec(),
            focus_categories: ["work", "learning", "learn", "project"]
                .map(String::from)
                .to_vec(),
            focus_minutes: 90.0,
            timezone: "UTC".to_string(),
            period: Period::default(),
            date_range: None,
            recurrence_lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

impl PipelineConfig {
    /// Checks every field that could make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.category_delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter { which: "category" });
        }
        if self.subcategory_delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter {
                which: "subcategory",
            });
        }
        self.weekday_set()?;
        if !self.focus_minutes.is_finite() || self.focus_minutes < 0.0 {
            return Err(ConfigError::InvalidFocusMinutes(self.focus_minutes));
        }
        if self.recurrence_lookahead_days < 1 {
            return Err(ConfigError::InvalidLookahead(
                self.recurrence_lookahead_days,
            ));
        }
        if let Some(range) = self.date_range {
            DateRange::new(range.start(), range.end())?;
        }
        Ok(())
    }

    /// Parses `weekdays`. Accepts full or three-letter names in any case.
    pub fn weekday_set(&self) -> Result<HashSet<Weekday>, ConfigError> {
        self.weekdays
            .iter()
            .map(|name| {
                Weekday::from_str(name.trim())
                    .map_err(|_| ConfigError::UnknownWeekday(name.clone()))
            })
            .collect()
    }

    /// Builds the tagger settings.
    pub fn feature_config(&self) -> Result<FeatureConfig, ConfigError> {
        Ok(FeatureConfig::new(
            self.weekday_set()?,
            &self.focus_categories,
            self.focus_minutes,
        ))
    }
}
