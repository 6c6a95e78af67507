//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ta_core::Period;

/// Calendar time analyzer.
///
/// Turns an iCalendar export into a CSV of day-bounded, categorised time
/// segments for charting and aggregation.
#[derive(Debug, Parser)]
#[command(name = "ta", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a calendar export into the segment table.
    Run(RunArgs),

    /// Print the effective configuration as JSON.
    Config,
}

/// Options for `ta run`. Each one overrides the matching config value.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Calendar file, or a directory searched for the first `.ics` file.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Destination CSV file. Replaced atomically.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Preset window ending now: 1w, 2w, 1m, 3m, 6m, 1y, 2y, 5y.
    #[arg(short, long)]
    pub period: Option<Period>,

    /// First day of an explicit window (YYYY-MM-DD). Overrides --period.
    #[arg(long, requires = "end_date")]
    pub start_date: Option<NaiveDate>,

    /// Last day of an explicit window, inclusive (YYYY-MM-DD).
    #[arg(long, requires = "start_date")]
    pub end_date: Option<NaiveDate>,

    /// Separator between category and subcategories.
    #[arg(long)]
    pub cat_delimiter: Option<String>,

    /// Separator between subcategories.
    #[arg(long)]
    pub subcat_delimiter: Option<String>,

    /// Comma-separated day names counted as weekdays.
    #[arg(long, value_delimiter = ',')]
    pub weekdays: Option<Vec<String>>,

    /// Comma-separated categories that can form focus sessions.
    #[arg(long, value_delimiter = ',')]
    pub focus_categories: Option<Vec<String>>,

    /// Minimum minutes for a focus session.
    #[arg(long)]
    pub focus_minutes: Option<f64>,

    /// IANA timezone for the output, or "local".
    #[arg(long)]
    pub timezone: Option<String>,

    /// Pin "now" (RFC 3339, YYYY-MM-DD, or e.g. "2 days ago").
    #[arg(long)]
    pub now: Option<String>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}
