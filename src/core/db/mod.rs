/// Database Module
///
/// This module provides the building blocks of the tablekit data-access
/// layer, organized into focused submodules.
///
/// ## Architecture
///
/// - **Schema Model** (`schema.rs`): column/table descriptions, validation and introspection
/// - **Records** (`record.rs`): fields, rows and read results handed back to callers
/// - **Statement Builder** (`builder.rs`): pure SQL synthesis with bound parameters
/// - **Connection Management** (`connection.rs`): handle lifecycle, key unlock, schema materialization
/// - **Query Execution** (`query.rs`): statement execution and result materialization
///
/// ## Error Handling
///
/// All database operations use the standardized `TablekitError` type for consistent error propagation.
pub mod builder;
pub mod connection;
pub mod query;
pub mod record;
pub mod schema;

pub use builder::{Combinator, Statement};
pub use connection::{ConnectionManager, ConnectionOptions, DatabaseFile};
pub use query::{QueryExecutor, QueryResult};
pub use record::{Field, Records, Row};
pub use schema::{Column, ColumnType, Constraint, TableSchema};
