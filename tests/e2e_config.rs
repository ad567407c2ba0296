//! E2E tests for session configuration
//!
//! Tests settings files, JSON configs, validation and replaying a
//! previous session's `setting.txt`.

use niadc::config::ConfigError;
use niadc::{Session, SessionConfig, SimulatedSource};
use std::path::PathBuf;

#[test]
fn test_defaults_match_documented_values() {
    let config = SessionConfig::default();
    assert_eq!(config.device, "dev0");
    assert_eq!(config.channel, vec![0, 1]);
    assert_eq!(config.data_length, niadc_core::DEFAULT_DATA_LENGTH);
    assert_eq!(config.sampling_rate, niadc_core::DEFAULT_SAMPLING_RATE);
    assert_eq!(config.read_samples, niadc_core::DEFAULT_READ_SAMPLES);
    assert_eq!(config.export_period_ms, niadc_core::DEFAULT_EXPORT_PERIOD_MS);
    assert_eq!(config.save_file_name, "measured_data.csv");
}

#[test]
fn test_settings_file_partial_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("setting.txt");
    std::fs::write(&path, "device: Dev3\nchannel: 5, 1, 3\nread_samples: 250\n").unwrap();

    let config = SessionConfig::load(&path).unwrap();
    assert_eq!(config.device, "Dev3");
    assert_eq!(config.channel, vec![5, 1, 3]);
    assert_eq!(config.read_samples, 250);
    // Untouched keys keep their defaults
    assert_eq!(config.sampling_rate, 1000);
    assert_eq!(config.data_length, 10_000);
}

#[test]
fn test_json_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("niadc.json");
    std::fs::write(
        &path,
        r#"{"sampling_rate": 5000, "save_file_dir": "/data", "channel": [0, 2]}"#,
    )
    .unwrap();

    let config = SessionConfig::load(&path).unwrap();
    assert_eq!(config.sampling_rate, 5000);
    assert_eq!(config.save_file_dir, PathBuf::from("/data"));
    assert_eq!(config.channel, vec![0, 2]);
}

#[test]
fn test_invalid_json_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("niadc.json");
    std::fs::write(&path, r#"{"sampling_rate": -1}"#).unwrap();
    assert!(matches!(
        SessionConfig::load(&path),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn test_rejects_invalid_values() {
    let cases = [
        "sampling_rate: 0",
        "read_samples: -10",
        "data_length: ten",
        "channel: ",
        "channel: 0,a",
        "channel: 2,2",
        "device:",
        "no separator here",
        "bogus_key: 1",
    ];
    for text in cases {
        assert!(
            SessionConfig::from_settings_text(text).is_err(),
            "accepted '{}'",
            text
        );
    }
}

#[test]
fn test_invalid_config_rejected_before_any_file_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        channel: vec![],
        save_file_dir: dir.path().to_path_buf(),
        ..SessionConfig::default()
    };
    let result = Session::create(config, Box::new(SimulatedSource::new()));
    assert!(result.is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_previous_session_settings_can_be_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        channel: vec![3, 0],
        sampling_rate: 2000,
        read_samples: 40,
        save_file_dir: dir.path().to_path_buf(),
        save_file_name: "run.csv".into(),
        ..SessionConfig::default()
    };
    let session = Session::create(config.clone(), Box::new(SimulatedSource::new())).unwrap();

    let replayed = SessionConfig::load(&session.paths().settings_path()).unwrap();
    assert_eq!(replayed, config);
}
