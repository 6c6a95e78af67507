//! Core domain logic for the time analyzer.
//!
//! This crate turns a calendar export into a table of day-bounded,
//! categorised time segments:
//! - Reading: parsing iCalendar documents and typing event times
//! - Expansion: turning recurrence rules into concrete occurrences
//! - Segmentation: title classification, day and subcategory splitting
//! - Reporting: timezone conversion, window clipping, feature tagging, CSV output

mod classify;
pub mod config;
mod features;
pub mod ics;
pub mod pipeline;
pub mod recurrence;
pub mod source;
mod split;
pub mod table;
mod time;
mod timezone;
pub mod types;
pub mod window;

pub use classify::{Classification, classify_title};
pub use config::{ConfigError, PipelineConfig};
pub use features::{FeatureConfig, tag_segment};
pub use ics::{CalendarDocument, DocumentError};
pub use pipeline::{Clock, FixedClock, PipelineOutput, SystemClock, run_pipeline, run_pipeline_with};
pub use recurrence::{
    ExpandedEvent, Expansion, MAX_INSTANCES, RecurrenceError, RecurrenceExpander, RuleExpander,
    expand_occurrences,
};
pub use source::{CalendarEventSource, EventError};
pub use split::{split_by_day, split_occurrence};
pub use table::{COLUMNS, TableError, write_table};
pub use time::weekday_name;
pub use timezone::{Localize, localize_all, resolve_timezone};
pub use types::{
    DayType, FeatureRecord, NO_SUBCATEGORY, Occurrence, Period, Segment, SubcategoryAllocation,
    ValidationError, Warning,
};
pub use window::{AnalysisWindow, DateRange};
