//! Configuration management for pathoracle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::OracleConfig;
use crate::selection::{SelectorConfig, SelectorKind};
use crate::telemetry::{CsvConfig, ReportingConfig};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path selection policy.
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Oracle reporting of bandwidth measurements.
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Local CSV stats files.
    #[serde(default)]
    pub csv: CsvConfig,

    /// Path oracle location.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.selector.validate()?;

        if self.selector.kind == SelectorKind::Oracle && !self.oracle.is_configured() {
            return Err(Error::InvalidConfig(
                "Oracle selector requires an oracle location".into(),
            ));
        }

        if self.reporting.application.is_empty() {
            return Err(Error::InvalidConfig("Report application name is empty".into()));
        }

        Ok(())
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "pathoracle", "pathoracle").map_or_else(
            || PathBuf::from("pathoracle.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            selector: SelectorConfig {
                fetch_scores_interval: Duration::from_secs(300),
                ..SelectorConfig::with_kind(SelectorKind::Oracle)
            },
            reporting: ReportingConfig {
                reporting_interval: Duration::from_secs(60),
                min_interval_for_report: Duration::from_secs(1),
                ..Default::default()
            },
            csv: CsvConfig {
                summary_file: Some(PathBuf::from("pathoracle-summary.csv")),
                interval_file: Some(PathBuf::from("pathoracle-intervals.csv")),
            },
            oracle: OracleConfig::with_location("127.0.0.1:8080"),
            ..Default::default()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output stays machine readable.
    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color).with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_example_roundtrips_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let example = Config::example();
        example.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.selector.kind, SelectorKind::Oracle);
        assert_eq!(loaded.oracle.location, "127.0.0.1:8080");
        assert_eq!(loaded.reporting.reporting_interval, Duration::from_secs(60));
        assert_eq!(loaded.csv.interval_file, example.csv.interval_file);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.selector.kind, SelectorKind::Shortest);
        assert!(config.csv.summary_file.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_oracle_selector_needs_location() {
        let config: Config = toml::from_str(
            r#"
            [selector]
            kind = "oracle"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_constant_selector_needs_pin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[selector]\nkind = \"constant\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
