//! Integration tests for configuration loading

use herbtrace_client::infra::config::{ENV_BASE_URL, ENV_REQUEST_TIMEOUT_MS};
use herbtrace_client::infra::{Config, Layout};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[api]
base_url = "http://10.1.2.3:8001/"
request_timeout_ms = 4000
probe_timeout_ms = 1500

[display]
layout = "mobile"
color = false
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.base_url(), "http://10.1.2.3:8001");
    assert_eq!(config.request_timeout_ms(), 4000);
    assert_eq!(config.probe_timeout_ms(), 1500);
    assert_eq!(config.layout(), Layout::Mobile);
    assert!(!config.color());
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.base_url(), "http://localhost:8001");
    assert_eq!(config.request_timeout_ms(), 10_000);
    assert_eq!(config.probe_timeout_ms(), 5_000);
    assert_eq!(config.layout(), Layout::Web);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[api\nbase_url = ").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));

    // load_from_path swallows the error and uses defaults
    let config = Config::load_from_path(temp_file.path());
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_unknown_layout_is_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[display]\nlayout = \"tablet\"\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_env_overrides_apply_after_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[api]\nbase_url = \"http://file-host:8001\"\nrequest_timeout_ms = 4000\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap().with_overrides(|name| match name {
        n if n == ENV_BASE_URL => Some("http://env-host:9000/".to_string()),
        n if n == ENV_REQUEST_TIMEOUT_MS => Some("250".to_string()),
        _ => None,
    });

    assert_eq!(config.base_url(), "http://env-host:9000");
    assert_eq!(config.request_timeout_ms(), 250);
    assert_eq!(config.probe_timeout_ms(), 5_000);
}

#[test]
fn test_shipped_configs_parse() {
    let dev = Config::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml")).unwrap();
    assert_eq!(dev.base_url(), "http://localhost:8001");

    let prod = Config::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/prod.toml")).unwrap();
    assert_eq!(prod.layout(), Layout::Mobile);
}
