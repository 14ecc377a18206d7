//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use std::time::Duration;
use tracing::Level;
use voxel_protocol::config::{ProtocolConfig, LATEST_PROTOCOL_VERSION, MAX_FRAME_SIZE};
use voxel_protocol::VersionRange;

#[test]
fn test_default_config_validates() {
    let config = ProtocolConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.server.versions, VersionRange { min: 13, max: 23 });
    assert_eq!(config.client.versions.max, LATEST_PROTOCOL_VERSION);
}

#[test]
fn test_empty_server_range() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.versions = VersionRange { min: 20, max: 14 };
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Server version range is empty")));
}

#[test]
fn test_range_beyond_latest() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.client.versions.max = LATEST_PROTOCOL_VERSION + 1;
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("newer than the latest")));
}

#[test]
fn test_zero_min_version() {
    let config = ProtocolConfig::default_with_overrides(|c| c.server.versions.min = 0);
    assert!(config.validate().iter().any(|e| e.contains("at least 1")));
}

#[test]
fn test_serialization_format_too_new() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.deployed_ser_fmt = 200;
        c.client.ser_fmt = 200;
    });
    let errors = config.validate();
    assert_eq!(
        errors.iter().filter(|e| e.contains("exceeds highest readable")).count(),
        2
    );
}

#[test]
fn test_handshake_timeout_bounds() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.handshake_timeout = Duration::from_millis(10);
        c.client.handshake_timeout = Duration::from_secs(1000);
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Server handshake timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Client handshake timeout too long")));
}

#[test]
fn test_frame_size_bounds() {
    let small = ProtocolConfig::default_with_overrides(|c| c.limits.max_frame_size = 8);
    assert!(small.validate().iter().any(|e| e.contains("too small")));

    let ok = ProtocolConfig::default_with_overrides(|c| c.limits.max_frame_size = 64);
    assert!(ok.validate().is_empty());
}

#[test]
fn test_logging_needs_an_output() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.logging.log_to_console = false;
        c.logging.log_to_file = false;
    });
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));

    let config = ProtocolConfig::default_with_overrides(|c| {
        c.logging.log_to_file = true;
        c.logging.log_file_path = None;
    });
    assert!(config.validate().iter().any(|e| e.contains("log_file_path")));
}

#[test]
fn test_multiple_errors_reported_together() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.versions = VersionRange { min: 0, max: 30 };
        c.limits.max_frame_size = 1;
        c.logging.app_name = String::new();
    });
    let errors = config.validate();
    assert!(errors.len() >= 4, "expected several errors, got {errors:?}");

    let err = config.validate_strict().expect_err("should fail");
    assert!(err.to_string().contains("Configuration validation failed"));
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = ProtocolConfig::from_toml(
        r#"
        [limits]
        max_frame_size = 4096
        "#,
    )
    .expect("should parse");
    assert_eq!(config.limits.max_frame_size, 4096);
    assert_eq!(config.server.versions.min, 13);
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_malformed_toml() {
    assert!(ProtocolConfig::from_toml("[limits\nmax_frame_size = ").is_err());
    assert!(ProtocolConfig::from_toml("[limits]\nmax_frame_size = \"big\"").is_err());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("protocol.toml");

    let config = ProtocolConfig::default_with_overrides(|c| {
        c.client.versions = VersionRange { min: 14, max: 20 };
        c.server.handshake_timeout = Duration::from_millis(2500);
        c.logging.log_level = Level::DEBUG;
    });
    config.save_to_file(&path).expect("save");

    let loaded = ProtocolConfig::from_file(&path).expect("load");
    assert_eq!(loaded.client.versions, VersionRange { min: 14, max: 20 });
    assert_eq!(loaded.server.handshake_timeout, Duration::from_millis(2500));
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert_eq!(loaded.limits.max_frame_size, MAX_FRAME_SIZE);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ProtocolConfig::from_file(dir.path().join("nope.toml")).expect_err("missing");
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
fn test_example_config_parses() {
    let example = ProtocolConfig::example_config();
    let parsed = ProtocolConfig::from_toml(&example).expect("example should parse");
    assert!(parsed.validate().is_empty());
}
