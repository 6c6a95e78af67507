//! The `ta run` command.
//!
//! Locates the calendar export, runs the pipeline with a pinned "now" and
//! replaces the output table in one atomic rename.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tempfile::NamedTempFile;
use ta_core::{CalendarDocument, DateRange, FeatureRecord, FixedClock, run_pipeline, write_table};

use super::summary::{RunSummary, format_summary, format_summary_json};
use super::util::{parse_datetime, resolve_timezone_arg};
use crate::cli::RunArgs;
use crate::config::Config;

/// Folds command-line overrides into the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) -> Result<()> {
    if let Some(input) = &args.input {
        config.input_dir.clone_from(input);
    }
    if let Some(output) = &args.output {
        config.output_path.clone_from(output);
    }

    let pipeline = &mut config.pipeline;
    if let Some(period) = args.period {
        pipeline.period = period;
    }
    if let (Some(start), Some(end)) = (args.start_date, args.end_date) {
        pipeline.date_range =
            Some(DateRange::new(start, end).context("invalid --start-date/--end-date")?);
    }
    if let Some(delimiter) = &args.cat_delimiter {
        pipeline.category_delimiter.clone_from(delimiter);
    }
    if let Some(delimiter) = &args.subcat_delimiter {
        pipeline.subcategory_delimiter.clone_from(delimiter);
    }
    if let Some(weekdays) = &args.weekdays {
        pipeline.weekdays.clone_from(weekdays);
    }
    if let Some(categories) = &args.focus_categories {
        pipeline.focus_categories.clone_from(categories);
    }
    if let Some(minutes) = args.focus_minutes {
        pipeline.focus_minutes = minutes;
    }
    if let Some(timezone) = &args.timezone {
        pipeline.timezone = resolve_timezone_arg(timezone)?;
    }

    Ok(())
}

/// Finds the calendar to read.
///
/// A file path is used as is. A directory yields its first `.ics` file in
/// name order.
pub fn locate_input(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        bail!("no calendar found: {} does not exist", path.display());
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("ics"))
        })
        .collect();
    candidates.sort();

    let Some(first) = candidates.first() else {
        bail!("no calendar found: {} has no .ics files", path.display());
    };
    if candidates.len() > 1 {
        tracing::warn!(
            count = candidates.len(),
            using = %first.display(),
            "multiple calendar files found"
        );
    }
    Ok(first.clone())
}

/// Writes the table beside `path` and renames it into place.
pub fn write_table_atomically(path: &Path, records: &[FeatureRecord]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut file = NamedTempFile::new_in(parent).context("failed to create temporary file")?;
    write_table(&mut file, records).context("failed to write table")?;
    file.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Reads and parses the calendar. Every failure here means the input is
/// unusable, whether the bytes cannot be read, are not UTF-8, or do not
/// parse.
fn read_calendar(path: &Path) -> Result<CalendarDocument> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("failed to read {}: not valid UTF-8", path.display()))?;
    CalendarDocument::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Deletes a previous run's table so it cannot pass for this run's result.
fn remove_stale_output(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "removed stale output table");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Runs the command.
pub fn run(config: &Config, args: &RunArgs) -> Result<()> {
    config
        .pipeline
        .validate()
        .context("invalid configuration")?;

    let now = match &args.now {
        Some(value) => parse_datetime(value, Utc::now())?,
        None => Utc::now(),
    };

    let input = locate_input(&config.input_dir)?;
    tracing::debug!(input = %input.display(), %now, "reading calendar");

    let document = match read_calendar(&input) {
        Ok(document) => document,
        Err(e) => {
            remove_stale_output(&config.output_path)?;
            return Err(e);
        }
    };

    let output = run_pipeline(&document, &config.pipeline, &FixedClock(now))
        .context("invalid configuration")?;
    write_table_atomically(&config.output_path, &output.records)?;

    let summary = RunSummary::new(&output, &input, &config.output_path);
    if args.json {
        println!("{}", format_summary_json(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }

    Ok(())
}
