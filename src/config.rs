//! Instrumentation configuration
//!
//! Values come from defaults, an optional TOML file, then CLI overrides. The
//! `enabled` flag is read once when an [`Instrumentation`](crate::engine::Instrumentation)
//! is built; a disabled instrumentation is inert for its whole lifetime.
//!
//! ```toml
//! max_samples = 5
//! aggregation_period_ms = 500
//! observed_key = "CheckoutForm"
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default capture-gate latch threshold
pub const DEFAULT_MAX_SAMPLES: usize = 5;
/// Default aggregation period in milliseconds
pub const DEFAULT_AGGREGATION_PERIOD_MS: u64 = 500;
/// Key attached to events when the host does not name the observed unit
pub const DEFAULT_OBSERVED_KEY: &str = "ComponentUnderTest";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_samples must be > 0, got {0}")]
    InvalidMaxSamples(usize),

    #[error("aggregation_period_ms must be > 0, got {0}")]
    InvalidPeriod(u64),

    #[error("observed_key must not be empty")]
    EmptyKey,

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Options fixed when the instrumentation scope is created
///
/// # Example
/// ```
/// use renderscope::config::ProfilerConfig;
///
/// let config = ProfilerConfig::default();
/// assert_eq!(config.max_samples, 5);
/// assert_eq!(config.aggregation_period_ms, 500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Events collected before the capture gate latches
    pub max_samples: usize,

    /// Interval between aggregation passes
    pub aggregation_period_ms: u64,

    /// Identifier attached to events from this scope
    pub observed_key: String,

    /// Development-only switch; when false, capture and aggregation are no-ops
    pub enabled: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            aggregation_period_ms: DEFAULT_AGGREGATION_PERIOD_MS,
            observed_key: DEFAULT_OBSERVED_KEY.to_string(),
            enabled: true,
        }
    }
}

impl ProfilerConfig {
    /// Configuration that never captures anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Larger sample window refreshed more often, for interactive sessions
    pub fn interactive() -> Self {
        Self {
            max_samples: 100,
            aggregation_period_ms: 250,
            ..Self::default()
        }
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_aggregation_period_ms(mut self, period_ms: u64) -> Self {
        self.aggregation_period_ms = period_ms;
        self
    }

    pub fn with_observed_key(mut self, key: impl Into<String>) -> Self {
        self.observed_key = key.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn aggregation_period(&self) -> Duration {
        Duration::from_millis(self.aggregation_period_ms)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_samples == 0 {
            return Err(ConfigError::InvalidMaxSamples(self.max_samples));
        }

        if self.aggregation_period_ms == 0 {
            return Err(ConfigError::InvalidPeriod(self.aggregation_period_ms));
        }

        if self.observed_key.trim().is_empty() {
            return Err(ConfigError::EmptyKey);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ProfilerConfig::default();
        assert_eq!(config.max_samples, 5);
        assert_eq!(config.aggregation_period_ms, 500);
        assert_eq!(config.observed_key, "ComponentUnderTest");
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interactive_config() {
        let config = ProfilerConfig::interactive();
        assert_eq!(config.max_samples, 100);
        assert_eq!(config.aggregation_period(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_config_is_valid() {
        let config = ProfilerConfig::disabled();
        assert!(!config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_max_samples() {
        let config = ProfilerConfig::default().with_max_samples(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxSamples(0))
        ));
    }

    #[test]
    fn test_invalid_period() {
        let config = ProfilerConfig::default().with_aggregation_period_ms(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPeriod(0))));
    }

    #[test]
    fn test_empty_key() {
        let config = ProfilerConfig::default().with_observed_key("  ");
        assert!(matches!(config.validate(), Err(ConfigError::EmptyKey)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ProfilerConfig::from_toml_str("max_samples = 12\n").unwrap();
        assert_eq!(config.max_samples, 12);
        assert_eq!(config.aggregation_period_ms, 500);
        assert!(config.enabled);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let err = ProfilerConfig::from_toml_str("max_metrics = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_validation_applies() {
        let err = ProfilerConfig::from_toml_str("aggregation_period_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriod(0)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "observed_key = \"Checkout\"\nenabled = false").unwrap();
        let config = ProfilerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.observed_key, "Checkout");
        assert!(!config.enabled);
    }

    #[test]
    fn test_from_missing_file() {
        let err = ProfilerConfig::from_file(Path::new("/nonexistent/renderscope.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
