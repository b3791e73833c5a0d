//! Configuration management for geoclue-position.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::client::{ClientSettings, SourceOptions};
use crate::identity::ApplicationIdentity;
use crate::position::{LastFixStore, PositioningMethods};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Position source settings.
    pub source: SourceSection,
    /// Last-position persistence.
    pub storage: StorageSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Position source configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Update interval in milliseconds (0 = as fast as the service allows).
    pub update_interval_ms: u32,
    /// Preferred positioning methods.
    pub preferred_methods: PositioningMethods,
    /// Application name used as the desktop id fallback.
    pub application_name: Option<String>,
}

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Restore and save the last known position.
    pub persist_last_position: bool,
    /// Override for the stored position file.
    pub last_position_path: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            persist_last_position: true,
            last_position_path: None,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(interval) = std::env::var("GEOCLUE_POSITION_UPDATE_INTERVAL") {
            if let Ok(interval) = interval.parse() {
                self.source.update_interval_ms = interval;
            }
        }

        if let Ok(methods) = std::env::var("GEOCLUE_POSITION_METHODS") {
            if let Ok(methods) = methods.parse() {
                self.source.preferred_methods = methods;
            }
        }

        if let Ok(level) = std::env::var("GEOCLUE_POSITION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(interval) = args.interval_ms {
            self.source.update_interval_ms = interval;
        }

        if let Some(methods) = args.methods {
            self.source.preferred_methods = methods;
        }

        if let Some(ref name) = args.app_name {
            self.source.application_name = Some(name.clone());
        }

        if args.no_persist {
            self.storage.persist_last_position = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Client settings described by the source section.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings::default()
            .with_interval(self.source.update_interval_ms)
            .with_methods(self.source.preferred_methods)
    }

    /// Last-position store, unless persistence is disabled.
    pub fn last_fix_store(&self) -> Option<LastFixStore> {
        if !self.storage.persist_last_position {
            return None;
        }
        match self.storage.last_position_path {
            Some(ref path) => Some(LastFixStore::new(path)),
            None => LastFixStore::at_default_location(),
        }
    }

    /// Convert to options for a [`PositionSource`](crate::PositionSource).
    pub fn to_source_options(&self) -> SourceOptions {
        let identity = self
            .source
            .application_name
            .as_deref()
            .map(ApplicationIdentity::new)
            .unwrap_or_default();

        SourceOptions {
            identity,
            settings: self.client_settings(),
            store: self.last_fix_store(),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.update_interval_ms, 0);
        assert_eq!(config.source.preferred_methods, PositioningMethods::All);
        assert!(config.source.application_name.is_none());
        assert!(config.storage.persist_last_position);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "source": {
                "update_interval_ms": 5000,
                "preferred_methods": "non-satellite",
                "application_name": "org.example.Maps"
            },
            "storage": {
                "last_position_path": "/tmp/fix.json"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.source.update_interval_ms, 5000);
        assert_eq!(
            config.source.preferred_methods,
            PositioningMethods::NonSatellite
        );
        assert_eq!(
            config.source.application_name.as_deref(),
            Some("org.example.Maps")
        );
        assert!(config.storage.persist_last_position); // Default
        assert_eq!(
            config.storage.last_position_path,
            Some(PathBuf::from("/tmp/fix.json"))
        );
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            interval_ms: Some(2000),
            methods: Some(PositioningMethods::Satellite),
            app_name: Some("org.example.Cli".to_string()),
            no_persist: true,
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.source.update_interval_ms, 2000);
        assert_eq!(config.source.preferred_methods, PositioningMethods::Satellite);
        assert_eq!(
            config.source.application_name.as_deref(),
            Some("org.example.Cli")
        );
        assert!(!config.storage.persist_last_position);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_client_settings_normalized() {
        let mut config = Config::default();
        config.source.update_interval_ms = 10;
        assert_eq!(config.client_settings().update_interval_ms, 1000);
    }

    #[test]
    fn test_store_disabled() {
        let mut config = Config::default();
        config.storage.persist_last_position = false;
        assert!(config.last_fix_store().is_none());
        assert!(config.to_source_options().store.is_none());
    }

    #[test]
    fn test_store_path_override() {
        let mut config = Config::default();
        config.storage.last_position_path = Some(PathBuf::from("/var/tmp/fix.json"));
        let store = config.last_fix_store().unwrap();
        assert_eq!(store.path(), Path::new("/var/tmp/fix.json"));
    }

    #[test]
    fn test_source_options_identity() {
        let mut config = Config::default();
        config.source.application_name = Some("org.example.Maps".into());
        let options = config.to_source_options();
        assert_eq!(
            options.identity.application_name(),
            Some("org.example.Maps")
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"update_interval_ms\""));
        assert!(json.contains("\"all\""));
    }
}
