//! The event-to-record pipeline.
//!
//! One run takes a parsed document, a configuration and a clock, and returns
//! ordered feature records plus every warning raised on the way. Nothing
//! inside a run reads process state, so pinning the clock pins the output.
//!
//! # Stages
//!
//! 1. Validate configuration and resolve the reporting zone and window
//! 2. Per event: normalize, expand recurrences, classify the title
//! 3. Convert occurrences to the reporting zone, then split by day and subcategory
//! 4. Clip to the window, tag features, sort

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::classify::classify_title;
use crate::config::{ConfigError, PipelineConfig};
use crate::features::tag_segment;
use crate::ics::{CalendarDocument, RawEvent};
use crate::recurrence::{RecurrenceExpander, RuleExpander, expand_occurrences};
use crate::source::CalendarEventSource;
use crate::split::split_occurrence;
use crate::timezone::{localize_all, resolve_timezone};
use crate::types::{FeatureRecord, Warning};
use crate::window::AnalysisWindow;

/// Source of "now" for a run.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// `X-WR-CALNAME` of the input, if it had one.
    pub calendar_name: Option<String>,
    /// `X-WR-TIMEZONE` of the input. Informational only.
    pub calendar_timezone: Option<String>,
    /// Sorted by start, then end.
    pub records: Vec<FeatureRecord>,
    pub warnings: Vec<Warning>,
    pub window: AnalysisWindow,
    /// The zone actually used, UTC after a fallback.
    pub timezone: Tz,
    pub now: DateTime<Utc>,
    pub events_read: usize,
    pub events_skipped: usize,
    pub occurrences: usize,
}

/// Runs the pipeline with the built-in recurrence evaluator.
pub fn run_pipeline<C: Clock + ?Sized>(
    document: &CalendarDocument,
    config: &PipelineConfig,
    clock: &C,
) -> Result<PipelineOutput, ConfigError> {
    run_pipeline_with(document, config, clock, &RuleExpander)
}

/// Runs the pipeline with a caller-supplied recurrence evaluator.
///
/// Only configuration problems are errors. A bad event is skipped with a
/// warning and the run carries on.
pub fn run_pipeline_with<C, E>(
    document: &CalendarDocument,
    config: &PipelineConfig,
    clock: &C,
    expander: &E,
) -> Result<PipelineOutput, ConfigError>
where
    C: Clock + ?Sized,
    E: RecurrenceExpander + ?Sized,
{
    config.validate()?;
    let features = config.feature_config()?;

    let mut warnings = Vec::new();
    let (tz, zone_warning) = resolve_timezone(&config.timezone);
    warnings.extend(zone_warning);

    let now = clock.now();
    let window = AnalysisWindow::resolve(config.period, config.date_range, now, tz);
    let horizon = (now + Duration::days(config.recurrence_lookahead_days))
        .max(window.end.with_timezone(&Utc));
    let window_start = window.start.with_timezone(&Utc);

    let mut segments = Vec::new();
    let mut events_skipped = 0;
    let mut occurrence_count = 0;

    for (i, raw) in document.events.iter().enumerate() {
        let index = i + 1;
        let source = match CalendarEventSource::from_raw(raw, tz) {
            Ok(source) => source,
            Err(e) => {
                events_skipped += 1;
                warnings.push(skipped(index, raw, &e));
                continue;
            }
        };

        for tzid in &source.unresolved_tzids {
            tracing::warn!(event = index, tzid = %tzid, "unknown TZID, reading as UTC");
            warnings.push(Warning::UnknownEventTimezone {
                index,
                tzid: tzid.clone(),
            });
        }

        let expanded = match expand_occurrences(&source, window_start, horizon, expander) {
            Ok(expanded) => expanded,
            Err(e) => {
                events_skipped += 1;
                warnings.push(skipped(index, raw, &e));
                continue;
            }
        };
        if expanded.truncated {
            tracing::warn!(event = index, title = %source.title, "recurrence expansion truncated");
            warnings.push(Warning::ExpansionTruncated {
                index,
                title: source.title.clone(),
            });
        }
        let occurrences = expanded.occurrences;
        occurrence_count += occurrences.len();

        let classification = classify_title(
            &source.title,
            &config.category_delimiter,
            &config.subcategory_delimiter,
        );
        for occurrence in localize_all(&occurrences, tz) {
            segments.extend(split_occurrence(&occurrence, &classification));
        }
    }

    let clipped = window.clip_all(&segments);
    tracing::debug!(
        events = document.events.len(),
        skipped = events_skipped,
        occurrences = occurrence_count,
        segments = segments.len(),
        clipped = clipped.len(),
        "pipeline stages complete"
    );

    let mut records: Vec<FeatureRecord> = clipped
        .into_iter()
        .map(|segment| tag_segment(segment, &features))
        .collect();
    records.sort_by(|a, b| {
        a.segment
            .start
            .cmp(&b.segment.start)
            .then_with(|| a.segment.end.cmp(&b.segment.end))
    });

    Ok(PipelineOutput {
        calendar_name: document.name.clone(),
        calendar_timezone: document.timezone.clone(),
        records,
        warnings,
        window,
        timezone: tz,
        now,
        events_read: document.events.len(),
        events_skipped,
        occurrences: occurrence_count,
    })
}

/// Names a skipped event by its title, else its `UID`.
fn skipped(index: usize, raw: &RawEvent, reason: &dyn std::error::Error) -> Warning {
    let title = raw
        .summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(raw.uid.as_deref())
        .unwrap_or("untitled")
        .to_string();
    tracing::warn!(event = index, title = %title, error = %reason, "skipping event");
    Warning::SkippedEvent {
        index,
        title,
        reason: reason.to_string(),
    }
}
