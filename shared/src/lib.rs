//! Dashboards Shared Library
//!
//! Wire types, input validation and token-level error kinds shared by the
//! backend and its clients.

pub mod errors;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
