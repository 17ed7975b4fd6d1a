//! Server Configuration

use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, ConfigError, Environment, File};
use scorer::{Cutoff, ScoreError};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Environment variable prefix, e.g. `SCORER_BUNDLE_PATH`
pub const ENV_PREFIX: &str = "SCORER";

/// Config file looked up when none is given (any extension `config` knows)
pub const DEFAULT_CONFIG_FILE: &str = "scorer";

/// API server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address
    pub bind_addr: String,
    /// Bundle loaded once at start-up
    pub bundle_path: PathBuf,
    /// Cutoff used when a request does not carry one
    pub default_cutoff: f64,
    /// Max tracing level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            bundle_path: PathBuf::from("models/bundle.bin"),
            default_cutoff: 0.5,
            log_level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Defaults, then the config file, then `SCORER_*` environment variables.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        Config::builder()
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default(
                "bundle_path",
                defaults.bundle_path.to_string_lossy().into_owned(),
            )?
            .set_default("default_cutoff", defaults.default_cutoff)?
            .set_default("log_level", defaults.log_level)?
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some()))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
    }

    /// Validated default cutoff
    pub fn cutoff(&self) -> Result<Cutoff, ScoreError> {
        Cutoff::new(self.default_cutoff)
    }

    /// Parsed log level, `INFO` when unrecognised
    pub fn log_level(&self) -> Level {
        Level::from_str(self.log_level.trim()).unwrap_or(Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.cutoff().unwrap(), Cutoff::default());
        assert_eq!(config.log_level(), Level::INFO);
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scorer.toml");
        std::fs::write(
            &path,
            "bundle_path = \"models/loan.json\"\ndefault_cutoff = 0.65\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let config = ApiConfig::load(path.to_str()).unwrap();

        assert_eq!(config.bundle_path, PathBuf::from("models/loan.json"));
        assert_eq!(config.default_cutoff, 0.65);
        assert_eq!(config.log_level(), Level::DEBUG);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(ApiConfig::load(Some("/nonexistent/scorer-config.toml")).is_err());
    }

    #[test]
    fn test_out_of_range_cutoff_rejected() {
        let config = ApiConfig {
            default_cutoff: 1.5,
            ..Default::default()
        };
        assert!(config.cutoff().is_err());
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let config = ApiConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert_eq!(config.log_level(), Level::INFO);
    }
}
