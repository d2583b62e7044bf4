//! Services - business logic and state management
//!
//! - `projector` - Turns a package record into ordered display fields
//! - `session` - Lookup state machine (idle, loading, success, failed)

pub mod projector;
pub mod session;

// Re-export commonly used types
pub use projector::{classify_status, format_date, project, FieldSchema};
pub use session::{LookupSession, LookupState, TransitionError};
