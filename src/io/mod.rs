//! IO modules - external system interfaces
//!
//! - `fetch` - HTTP client for the package backend (lookup + reachability probe)
//! - `fixture_server` - In-process backend serving canned responses
//! - `terminal` - Text rendering of display fields

pub mod fetch;
pub mod fixture_server;
pub mod terminal;

// Re-export commonly used types
pub use fetch::{FetchClient, FetchError, PackageSource};
pub use fixture_server::{FixtureResponse, FixtureRoutes, FixtureServer};
pub use terminal::render;
