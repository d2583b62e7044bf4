//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! `HERBTRACE_*` environment variables override file values. Everything is
//! resolved once at startup and handed to components explicitly.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const ENV_BASE_URL: &str = "HERBTRACE_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "HERBTRACE_REQUEST_TIMEOUT_MS";
pub const ENV_PROBE_TIMEOUT_MS: &str = "HERBTRACE_PROBE_TIMEOUT_MS";

const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

/// Field layout used when projecting records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Web,
    Mobile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub layout: Layout,
    /// Colour quality-check badges in terminal output
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { layout: Layout::default(), color: default_color() }
    }
}

fn default_color() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    request_timeout_ms: u64,
    probe_timeout_ms: u64,
    layout: Layout,
    color: bool,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            base_url: normalize_base_url(&toml_config.api.base_url),
            request_timeout_ms: toml_config.api.request_timeout_ms,
            probe_timeout_ms: toml_config.api.probe_timeout_ms,
            layout: toml_config.display.layout,
            color: toml_config.display.color,
            config_file,
        }
    }

    /// Determine config file path from an explicit argument or environment
    pub fn resolve_config_path(explicit: Option<&str>) -> String {
        if let Some(path) = explicit {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Full startup resolution: file (or defaults), then environment overrides
    pub fn load(explicit: Option<&str>) -> Self {
        Self::load_from_path(Self::resolve_config_path(explicit))
            .with_overrides(|name| env::var(name).ok())
    }

    /// Apply `HERBTRACE_*` overrides read through `var`
    pub fn with_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = normalize_base_url(&url);
        }
        if let Some(ms) = parse_override(ENV_REQUEST_TIMEOUT_MS, var(ENV_REQUEST_TIMEOUT_MS)) {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = parse_override(ENV_PROBE_TIMEOUT_MS, var(ENV_PROBE_TIMEOUT_MS)) {
            self.probe_timeout_ms = ms;
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    pub fn probe_timeout_ms(&self) -> u64 {
        self.probe_timeout_ms
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn color(&self) -> bool {
        self.color
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(url.as_ref());
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_probe_timeout_ms(mut self, ms: u64) -> Self {
        self.probe_timeout_ms = ms;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_override(name: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!(variable = %name, value = %raw, "config_override_ignored");
            None
        }
    }
}
