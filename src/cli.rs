//! CLI argument parsing for renderscope

use crate::config::{ConfigError, ProfilerConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the statistics report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Text,
    /// JSON for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "renderscope")]
#[command(version)]
#[command(about = "Render-timing instrumentation with bounded capture and periodic aggregation", long_about = None)]
pub struct Cli {
    /// Stop capturing after this many samples (until reset)
    #[arg(short = 'n', long = "max-samples", value_name = "N")]
    pub max_samples: Option<usize>,

    /// Aggregation period in milliseconds
    #[arg(short = 'p', long = "period-ms", value_name = "MS")]
    pub period_ms: Option<u64>,

    /// Key used for reports that do not name their component
    #[arg(short = 'k', long = "key", value_name = "KEY")]
    pub key: Option<String>,

    /// Load settings from a TOML file (flags override it)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Turn instrumentation off; the workload still runs
    #[arg(long = "disabled")]
    pub disabled: bool,

    /// Number of demo form renders to drive
    #[arg(short = 'r', long = "renders", value_name = "N", default_value = "12")]
    pub renders: usize,

    /// Replay render reports from a JSON Lines file instead of the demo form
    #[arg(long = "replay", value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Print the column legend after the table
    #[arg(long = "legend")]
    pub legend: bool,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Build the profiler configuration: file first, then flag overrides
    pub fn profiler_config(&self) -> Result<ProfilerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ProfilerConfig::from_file(path)?,
            None => ProfilerConfig::default(),
        };

        if let Some(max_samples) = self.max_samples {
            config.max_samples = max_samples;
        }
        if let Some(period_ms) = self.period_ms {
            config.aggregation_period_ms = period_ms;
        }
        if let Some(key) = &self.key {
            config.observed_key = key.clone();
        }
        if self.disabled {
            config.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}
