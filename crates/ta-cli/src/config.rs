//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use ta_core::PipelineConfig;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory searched for a calendar export when `--input` is not given.
    pub input_dir: PathBuf,

    /// Where the segment table is written.
    pub output_path: PathBuf,

    /// Pipeline settings, flattened into the top level of the file.
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("input_dir", &self.input_dir)
            .field("output_path", &self.output_path)
            .field("timezone", &self.pipeline.timezone)
            .field("period", &self.pipeline.period)
            .field("date_range", &self.pipeline.date_range)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            input_dir: data_dir.join("ics"),
            output_path: data_dir.join("output").join("calendar.csv"),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TA_*)
        figment = figment.merge(Env::prefixed("TA_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for ta.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ta"))
}

/// Returns the platform-specific data directory for ta.
///
/// On Linux: `~/.local/share/ta`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ta"))
}
