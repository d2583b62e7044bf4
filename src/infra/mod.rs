//! Infrastructure - configuration and metrics
//!
//! - `config` - Application configuration (TOML loading, env overrides, defaults)
//! - `metrics` - Lock-free lookup counters

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, Layout};
pub use metrics::Metrics;
