//! Run summary rendering (human-readable and JSON).

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;
use chrono::{SecondsFormat, Weekday};
use serde::Serialize;
use ta_core::{DayType, PipelineOutput, weekday_name};

use super::util::format_minutes;

/// Everything printed after a successful run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub calendar_name: Option<String>,
    pub calendar_timezone: Option<String>,
    pub input: String,
    pub output: String,
    pub timezone: String,
    pub window: JsonWindow,
    pub events_read: usize,
    pub events_skipped: usize,
    pub occurrences: usize,
    pub rows: usize,
    pub focus_sessions: usize,
    pub total_minutes: f64,
    /// Longest first.
    pub by_category: Vec<CategoryTotal>,
    /// Weekday before Weekend, only types that have time.
    pub by_day_type: Vec<DayTotal>,
    /// Monday first, only days that have time.
    pub by_day_of_week: Vec<DayTotal>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JsonWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub minutes: f64,
}

#[derive(Debug, Serialize)]
pub struct DayTotal {
    pub day: String,
    pub minutes: f64,
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl RunSummary {
    pub fn new(output: &PipelineOutput, input: &Path, destination: &Path) -> Self {
        let mut by_category: Vec<CategoryTotal> = Vec::new();
        for record in &output.records {
            let category = &record.segment.category;
            if let Some(total) = by_category.iter_mut().find(|t| &t.category == category) {
                total.minutes += record.duration_minutes;
            } else {
                by_category.push(CategoryTotal {
                    category: category.clone(),
                    minutes: record.duration_minutes,
                });
            }
        }
        by_category.sort_by(|a, b| {
            b.minutes
                .total_cmp(&a.minutes)
                .then_with(|| a.category.cmp(&b.category))
        });

        let mut weekday_minutes = [0.0_f64; 7];
        let mut day_type_minutes = [0.0_f64; 2];
        for record in &output.records {
            weekday_minutes[record.day_of_week.num_days_from_monday() as usize] +=
                record.duration_minutes;
            let slot = match record.day_type {
                DayType::Weekday => 0,
                DayType::Weekend => 1,
            };
            day_type_minutes[slot] += record.duration_minutes;
        }
        let by_day_type = [DayType::Weekday, DayType::Weekend]
            .into_iter()
            .zip(day_type_minutes)
            .filter(|(_, minutes)| *minutes > 0.0)
            .map(|(day_type, minutes)| DayTotal {
                day: day_type.to_string(),
                minutes,
            })
            .collect();
        let by_day_of_week = WEEK
            .into_iter()
            .zip(weekday_minutes)
            .filter(|(_, minutes)| *minutes > 0.0)
            .map(|(day, minutes)| DayTotal {
                day: weekday_name(day).to_string(),
                minutes,
            })
            .collect();

        Self {
            generated_at: output.now.to_rfc3339_opts(SecondsFormat::Secs, true),
            calendar_name: output.calendar_name.clone(),
            calendar_timezone: output.calendar_timezone.clone(),
            input: input.display().to_string(),
            output: destination.display().to_string(),
            timezone: output.timezone.name().to_string(),
            window: JsonWindow {
                start: output.window.start.to_rfc3339_opts(SecondsFormat::Secs, false),
                end: output.window.end.to_rfc3339_opts(SecondsFormat::Secs, false),
            },
            events_read: output.events_read,
            events_skipped: output.events_skipped,
            occurrences: output.occurrences,
            rows: output.records.len(),
            focus_sessions: output.records.iter().filter(|r| r.is_focus_session).count(),
            total_minutes: output.records.iter().map(|r| r.duration_minutes).sum(),
            by_category,
            by_day_type,
            by_day_of_week,
            warnings: output.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Formats the summary for a terminal.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    writeln!(output, "CALENDAR ANALYSIS ({})", summary.timezone).unwrap();
    match (&summary.calendar_name, &summary.calendar_timezone) {
        (Some(name), Some(zone)) => writeln!(output, "Calendar: {name} ({zone})").unwrap(),
        (Some(name), None) => writeln!(output, "Calendar: {name}").unwrap(),
        (None, Some(zone)) => writeln!(output, "Calendar: ({zone})").unwrap(),
        (None, None) => {}
    }
    writeln!(output, "Window:  {} to {}", summary.window.start, summary.window.end).unwrap();
    writeln!(output, "Input:   {}", summary.input).unwrap();
    writeln!(output, "Output:  {}", summary.output).unwrap();
    writeln!(
        output,
        "Events:  {} read, {} skipped, {} occurrences",
        summary.events_read, summary.events_skipped, summary.occurrences
    )
    .unwrap();
    writeln!(
        output,
        "Rows:    {} ({} focus sessions)",
        summary.rows, summary.focus_sessions
    )
    .unwrap();
    writeln!(output, "Total:   {}", format_minutes(summary.total_minutes)).unwrap();

    writeln!(output).unwrap();
    writeln!(output, "BY CATEGORY").unwrap();
    writeln!(output, "───────────").unwrap();
    if summary.by_category.is_empty() {
        writeln!(output, "(no segments in window)").unwrap();
    }
    for total in &summary.by_category {
        writeln!(
            output,
            "  {:<20}{}",
            total.category,
            format_minutes(total.minutes)
        )
        .unwrap();
    }

    write_day_section(&mut output, "BY DAY TYPE", &summary.by_day_type);
    write_day_section(&mut output, "BY DAY OF WEEK", &summary.by_day_of_week);

    if !summary.warnings.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "WARNINGS ({})", summary.warnings.len()).unwrap();
        writeln!(output, "────────").unwrap();
        for warning in &summary.warnings {
            writeln!(output, "  {warning}").unwrap();
        }
    }

    output
}

fn write_day_section(output: &mut String, title: &str, totals: &[DayTotal]) {
    if totals.is_empty() {
        return;
    }
    writeln!(output).unwrap();
    writeln!(output, "{title}").unwrap();
    writeln!(output, "{}", "─".repeat(title.chars().count())).unwrap();
    for total in totals {
        writeln!(output, "  {:<20}{}", total.day, format_minutes(total.minutes)).unwrap();
    }
}

/// Formats the summary as pretty JSON.
pub fn format_summary_json(summary: &RunSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
