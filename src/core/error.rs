/// Tablekit Error Module
///
/// This module defines the error taxonomy shared by every layer of tablekit.
/// Engine failures are normalized into plain strings so callers see the same
/// message shape regardless of which query produced them.
use thiserror::Error;

/// Comprehensive error type for tablekit.
///
/// The variants follow the layer that produced the failure:
/// - connection lifecycle (open, key unlock, not connected)
/// - schema validation and DDL
/// - statement building (invalid arguments)
/// - engine execution
/// - empty result sets, for callers that opt into that contract
#[derive(Error, Debug)]
pub enum TablekitError {
    /// Connection is closed, or could not be opened/unlocked
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed schema or DDL failure other than "already exists"
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid arguments handed to the statement builder
    #[error("Builder error: {0}")]
    Builder(String),

    /// Normalized message reported by the storage engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// Query succeeded but returned no rows
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for TablekitError {
    fn from(err: rusqlite::Error) -> Self {
        TablekitError::Engine(engine_message(&err))
    }
}

/// Type alias for Result to use TablekitError as the error type.
pub type Result<T> = std::result::Result<T, TablekitError>;

/// Message used whenever an operation needs an open connection.
pub const NOT_CONNECTED: &str = "Not connected to database";

/// Message carried by `TablekitError::EmptyResult`.
pub const EMPTY_TABLE: &str = "The table is empty";

/// Normalizes an engine message: "not an error" collapses to an empty
/// string and the first letter is capitalized.
pub fn normalize_engine_message(message: &str) -> String {
    if message == "not an error" {
        return String::new();
    }

    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Extracts the engine's own message from a rusqlite error and normalizes it.
pub fn engine_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => normalize_engine_message(message),
        other => normalize_engine_message(&other.to_string()),
    }
}
