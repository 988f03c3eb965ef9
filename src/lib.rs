// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod database;
pub mod unique_id;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types for convenience
pub use crate::core::db::{
    Column, ColumnType, Combinator, ConnectionOptions, Constraint, DatabaseFile, Field,
    QueryResult, Records, Row, TableSchema,
};
pub use crate::core::{Result, TablekitError};
pub use crate::database::Database;
