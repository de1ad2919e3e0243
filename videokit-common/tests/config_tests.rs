//! Configuration resolution tests
//!
//! Uses serial_test because tests manipulate VIDEOKIT_CONFIG.

use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;
use videokit_common::config::{resolve_config_path, BridgeConfig, CONFIG_ENV_VAR};
use videokit_common::Error;

fn write_config(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "cli.toml", "[video]\nwidth = 640\n");
    let envf = write_config(&dir, "env.toml", "[video]\nwidth = 320\n");
    env::set_var(CONFIG_ENV_VAR, &envf);

    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));
    let config = BridgeConfig::resolve(Some(&cli)).unwrap();
    assert_eq!(config.video.width, 640);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_variable_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let envf = write_config(
        &dir,
        "env.toml",
        "[audio]\nsample_rate = 44100\nchannels = 2\n[session]\npoll_interval_ms = 25\n",
    );
    env::set_var(CONFIG_ENV_VAR, &envf);

    let config = BridgeConfig::resolve(None).unwrap();
    assert_eq!(config.audio.sample_rate, 44_100);
    assert_eq!(config.audio.channels, 2);
    assert_eq!(config.session.poll_interval_ms, 25);
    // Untouched sections keep defaults
    assert_eq!(config.video.width, 960);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = BridgeConfig::resolve(Some(&missing)).unwrap();
    assert_eq!(config, BridgeConfig::default());
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let bad = write_config(&dir, "bad.toml", "[video]\nwidth = \"wide\"\n");

    let err = BridgeConfig::load(&bad).unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
}

#[test]
#[serial]
fn test_invalid_values_are_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let bad = write_config(&dir, "zero.toml", "[audio]\nchannels = 0\n");

    let err = BridgeConfig::load(&bad).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
