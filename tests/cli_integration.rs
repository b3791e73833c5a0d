//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

use geoclue_position::cli::{parse_args_from, Args};
use geoclue_position::config::Config;
use geoclue_position::{LocationReading, PositioningMethods};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("geoclue-position")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.config.is_none());
    assert!(result.replay.is_none());
    assert!(result.interval_ms.is_none());
    assert!(result.timeout_ms.is_none());
    assert!(result.methods.is_none());
    assert!(!result.no_persist);
    assert!(!result.help);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-r",
        "drive.json",
        "-i",
        "1500",
        "-m",
        "non-satellite",
        "-a",
        "org.example.Maps",
        "-l",
        "debug",
        "--no-persist",
    ]))
    .unwrap();

    assert_eq!(result.replay, Some(PathBuf::from("drive.json")));
    assert_eq!(result.interval_ms, Some(1500));
    assert_eq!(result.methods, Some(PositioningMethods::NonSatellite));
    assert_eq!(result.app_name, Some("org.example.Maps".to_string()));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert!(result.no_persist);
    assert!(result.timeout_ms.is_none());
}

#[test]
fn test_cli_single_shot() {
    let result = parse_args_from(args(&["--timeout", "5000"])).unwrap();
    assert_eq!(result.timeout_ms, Some(5000));
}

#[test]
fn test_cli_invalid_timeout() {
    let result = parse_args_from(args(&["-t", "-1"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_missing_value() {
    let result = parse_args_from(args(&["--replay"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_unknown_option() {
    let result = parse_args_from(args(&["--port", "8080"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "source": {
            "update_interval_ms": 3000,
            "preferred_methods": "satellite",
            "application_name": "org.example.Tracker"
        },
        "storage": {
            "persist_last_position": false
        },
        "logging": {
            "level": "debug"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.source.update_interval_ms, 3000);
    assert_eq!(config.source.preferred_methods, PositioningMethods::Satellite);
    assert_eq!(
        config.source.application_name.as_deref(),
        Some("org.example.Tracker")
    );
    assert!(!config.storage.persist_last_position);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(
        r#"{
        "source": {
            "update_interval_ms": 3000,
            "application_name": "org.example.FromFile"
        }
    }"#,
    );

    let args = Args {
        config: Some(file.path().to_path_buf()),
        interval_ms: Some(8000),
        app_name: Some("org.example.FromCli".to_string()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.source.update_interval_ms, 8000);
    assert_eq!(
        config.source.application_name.as_deref(),
        Some("org.example.FromCli")
    );
}

#[test]
fn test_config_no_persist_overrides_file() {
    let file = config_file(r#"{"storage": {"persist_last_position": true}}"#);

    let args = Args {
        config: Some(file.path().to_path_buf()),
        no_persist: true,
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    assert!(!config.storage.persist_last_position);
    assert!(config.to_source_options().store.is_none());
}

#[test]
fn test_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let args = Args {
        config: Some(dir.path().join("absent.json")),
        ..Args::default()
    };

    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_to_source_options() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fix.json");
    let file = config_file(&format!(
        r#"{{
        "source": {{
            "update_interval_ms": 200,
            "preferred_methods": "non-satellite",
            "application_name": "org.example.Maps"
        }},
        "storage": {{
            "last_position_path": {}
        }}
    }}"#,
        serde_json::to_string(&path).unwrap()
    ));

    let config = Config::from_file(file.path()).unwrap();
    let options = config.to_source_options();

    assert_eq!(options.settings.update_interval_ms, 1000);
    assert_eq!(
        options.settings.preferred_methods,
        PositioningMethods::NonSatellite
    );
    assert_eq!(options.identity.application_name(), Some("org.example.Maps"));
    assert_eq!(options.store.unwrap().path(), path.as_path());
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let mut original = Config::default();
    original.source.update_interval_ms = 4000;
    original.source.preferred_methods = PositioningMethods::Satellite;

    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded.source.update_interval_ms, 4000);
    assert_eq!(loaded.source.preferred_methods, PositioningMethods::Satellite);
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"source": {"update_interval_ms": 9000}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.source.update_interval_ms, 9000);
    assert_eq!(config.source.preferred_methods, PositioningMethods::All); // Default
    assert!(config.storage.persist_last_position); // Default
    assert_eq!(config.logging.level, "info"); // Default
}

// ============================================================================
// Replay File Tests
// ============================================================================

#[test]
fn test_replay_readings_parse_with_defaults() {
    let json = r#"[
        {"latitude": 52.52, "longitude": 13.405},
        {"latitude": 48.85, "longitude": 2.35, "altitude": 35.0, "speed": 1.5}
    ]"#;

    let readings: Vec<LocationReading> = serde_json::from_str(json).unwrap();

    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].altitude, f64::MIN);
    assert!(readings[0].speed < 0.0);
    assert!(readings[0].timestamp.is_unspecified());
    assert_eq!(readings[1].altitude, 35.0);
    assert_eq!(readings[1].speed, 1.5);
}
