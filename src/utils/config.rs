// src/utils/config.rs
//! Layered runtime configuration
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `rrd-spy.toml` in the working directory, or an explicit `--config` file
//! 3. `RRD_SPY_*` environment variables

use crate::utils::errors::{Result, SpyError};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default data log location, relative to the working directory
pub const DEFAULT_LOG_PATH: &str = "datalog.jsonl";

/// Default bounded read size for relay and replay
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default suffix appended to the canonical socket path while intercepted
pub const DEFAULT_ASIDE_SUFFIX: &str = "original";

/// Output format of the diagnostic log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SpyConfig {
    /// Data log written in record mode
    pub log_path: PathBuf,

    /// Maximum bytes read per readiness event
    pub chunk_size: usize,

    /// Suffix used for the aside socket path
    pub aside_suffix: String,

    /// Diagnostic log format
    pub log_format: LogFormat,
}

impl Default for SpyConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
            aside_suffix: DEFAULT_ASIDE_SUFFIX.to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl SpyConfig {
    /// Load configuration, reading `file` instead of `rrd-spy.toml` when given
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("log_path", DEFAULT_LOG_PATH)?
            .set_default("chunk_size", DEFAULT_CHUNK_SIZE as i64)?
            .set_default("aside_suffix", DEFAULT_ASIDE_SUFFIX)?
            .set_default("log_format", "pretty")?;

        let builder = match file {
            Some(path) => {
                debug!("Loading configuration from {:?}", path);
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name("rrd-spy").required(false)),
        };

        let config: SpyConfig = builder
            .add_source(Environment::with_prefix("RRD_SPY").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SpyError::ConfigError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.aside_suffix.is_empty() || self.aside_suffix.contains('/') {
            return Err(SpyError::ConfigError(format!(
                "invalid aside_suffix {:?}",
                self.aside_suffix
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = SpyConfig::default();
        assert_eq!(config.log_path, PathBuf::from("datalog.jsonl"));
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.aside_suffix, "original");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = SpyConfig::load_from(None).unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.aside_suffix, DEFAULT_ASIDE_SUFFIX);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "log_path = \"/tmp/session.jsonl\"").unwrap();
        writeln!(file, "chunk_size = 4096").unwrap();
        writeln!(file, "log_format = \"json\"").unwrap();

        let config = SpyConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.log_path, PathBuf::from("/tmp/session.jsonl"));
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.aside_suffix, "original");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = SpyConfig::load_from(Some(Path::new("/nonexistent/rrd-spy.toml")));
        assert!(matches!(result, Err(SpyError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = SpyConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_suffix() {
        let config = SpyConfig {
            aside_suffix: "a/b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
