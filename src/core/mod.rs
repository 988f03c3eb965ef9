/// Core Module for tablekit
///
/// This module contains the data-access layer itself: the schema model,
/// statement builder, connection manager, query executor and the shared
/// error type. The higher-level `Database` facade is composed from these.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, TablekitError};
