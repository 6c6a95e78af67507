//! CSV rendering of feature records.

use std::io::Write;

use chrono::SecondsFormat;
use serde::Serialize;
use thiserror::Error;

use crate::time::weekday_name;
use crate::types::FeatureRecord;

/// Output columns, in order.
pub const COLUMNS: [&str; 12] = [
    "date",
    "day_of_week",
    "day_type",
    "start_time",
    "end_time",
    "duration_minutes",
    "category",
    "subcategory",
    "is_focus_session",
    "full_summary",
    "start_datetime",
    "end_datetime",
];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush table: {0}")]
    Io(#[from] std::io::Error),
}

/// One CSV row. Field order must follow [`COLUMNS`].
#[derive(Debug, Serialize)]
struct TableRow<'a> {
    date: String,
    day_of_week: &'static str,
    day_type: &'static str,
    start_time: String,
    end_time: String,
    duration_minutes: f64,
    category: &'a str,
    subcategory: &'a str,
    is_focus_session: bool,
    full_summary: &'a str,
    start_datetime: String,
    end_datetime: String,
}

impl<'a> From<&'a FeatureRecord> for TableRow<'a> {
    fn from(record: &'a FeatureRecord) -> Self {
        let segment = &record.segment;
        Self {
            date: record.date.format("%Y-%m-%d").to_string(),
            day_of_week: weekday_name(record.day_of_week),
            day_type: record.day_type.as_str(),
            start_time: segment.start.format("%H:%M").to_string(),
            end_time: segment.end.format("%H:%M").to_string(),
            duration_minutes: record.duration_minutes,
            category: &segment.category,
            subcategory: &segment.subcategory,
            is_focus_session: record.is_focus_session,
            full_summary: &segment.title,
            start_datetime: segment.start.to_rfc3339_opts(SecondsFormat::Secs, false),
            end_datetime: segment.end.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

/// Writes the header and one row per record.
///
/// The header is written even when `records` is empty.
pub fn write_table<W: Write>(writer: W, records: &[FeatureRecord]) -> Result<(), TableError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(COLUMNS)?;
    for record in records {
        csv.serialize(TableRow::from(record))?;
    }
    csv.flush()?;
    Ok(())
}
