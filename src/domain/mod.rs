//! Domain models - package record and display fields
//!
//! - `record` - the nested traceability document served by the backend
//! - `display` - flat, labelled fields produced for UI layers

pub mod display;
pub mod record;

// Re-export commonly used types at module level
pub use display::{DisplayField, FieldKey, FieldValue, Section, Severity, NOT_SPECIFIED};
pub use record::PackageRecord;
