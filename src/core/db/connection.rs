/// Connection Management Module
///
/// This module owns the engine handle and drives the connect handshake:
/// open -> key -> verify -> configure -> materialize schemas. The handle is
/// released exactly once, on `close` or when the manager is dropped.

use crate::core::db::builder;
use crate::core::db::query::QueryExecutor;
use crate::core::db::schema::TableSchema;
use crate::core::error::{engine_message, NOT_CONNECTED};
use crate::core::{Result, TablekitError};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Probe used to force key validation on the first page read
const PROBE_SQL: &str = "SELECT count(*) FROM sqlite_master;";

/// Reported when a passphrase is given to an engine built without a cipher
pub const NO_CIPHER_SUPPORT: &str = "Encryption is not supported by the database engine";

/// Database file location and optional passphrase
#[derive(Clone)]
pub struct DatabaseFile {
    /// Path to the database file (created if absent)
    pub path: PathBuf,
    passphrase: Option<Zeroizing<String>>,
}

impl DatabaseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DatabaseFile {
            path: path.into(),
            passphrase: None,
        }
    }

    /// Sets the passphrase; an empty passphrase means "not encrypted"
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        let passphrase = Zeroizing::new(passphrase.into());
        self.passphrase = if passphrase.is_empty() {
            None
        } else {
            Some(passphrase)
        };
        self
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_ref().map(|p| p.as_str())
    }
}

impl fmt::Debug for DatabaseFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseFile")
            .field("path", &self.path)
            .field("encrypted", &self.passphrase.is_some())
            .finish()
    }
}

/// Pragmas applied right after the key has been verified
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionOptions {
    /// Enforce foreign key constraints
    #[serde(default)]
    pub foreign_keys: bool,
    /// Journal mode such as "wal" or "delete"; engine default when unset
    pub journal_mode: Option<String>,
}

/// Connection lifecycle state
enum ConnectionState {
    Closed,
    Open { conn: Connection, path: PathBuf },
}

/// Connection manager owning exactly one engine handle
pub struct ConnectionManager {
    state: ConnectionState,
}

impl ConnectionManager {
    /// Creates a manager in the `Closed` state
    pub fn new() -> Self {
        ConnectionManager {
            state: ConnectionState::Closed,
        }
    }

    /// Opens the database and materializes `tables`.
    ///
    /// Calling this while already connected is a no-op that returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - `TablekitError::Connection` if the file cannot be opened, the key
    ///   is wrong, the file is not a database, or a pragma fails. The
    ///   manager stays `Closed` and no handle is kept.
    /// - `TablekitError::Schema` if a schema is malformed or its DDL fails
    ///   for a reason other than "already exists". No table of the batch is
    ///   created, and the manager stays `Open`.
    pub fn connect(
        &mut self,
        file: &DatabaseFile,
        tables: &[TableSchema],
        options: &ConnectionOptions,
    ) -> Result<()> {
        if self.is_connected() {
            debug!(path = %file.path.display(), "already connected");
            return Ok(());
        }

        let conn = open_and_unlock(file, options)?;
        info!(path = %file.path.display(), tables = tables.len(), "connected to database");

        self.state = ConnectionState::Open {
            conn,
            path: file.path.clone(),
        };

        self.materialize(tables)
    }

    /// Creates every table in one transaction, skipping tables that exist
    fn materialize(&self, tables: &[TableSchema]) -> Result<()> {
        let conn = self.connection()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| TablekitError::Schema(engine_message(&e)))?;

        for schema in tables {
            let statement = builder::create_table(schema)?;
            match QueryExecutor::new(&tx).execute(&statement) {
                Ok(_) => debug!(table = %schema.name, "created table"),
                Err(TablekitError::Engine(msg)) if msg.contains("already exists") => {
                    debug!(table = %schema.name, "table already exists")
                }
                Err(TablekitError::Engine(msg)) => {
                    warn!(table = %schema.name, error = %msg, "schema materialization failed");
                    return Err(TablekitError::Schema(msg));
                }
                Err(other) => return Err(other),
            }
        }

        tx.commit()
            .map_err(|e| TablekitError::Schema(engine_message(&e)))
    }

    /// Closes the handle. Closing a closed manager does nothing.
    pub fn close(&mut self) {
        if let ConnectionState::Open { conn, path } =
            std::mem::replace(&mut self.state, ConnectionState::Closed)
        {
            if let Err((_, e)) = conn.close() {
                warn!(path = %path.display(), error = %e, "error while closing database");
            }
            info!(path = %path.display(), "closed database");
        }
    }

    /// Returns the open connection
    ///
    /// # Errors
    ///
    /// Returns `TablekitError::Connection("Not connected to database")` when closed.
    pub fn connection(&self) -> Result<&Connection> {
        match &self.state {
            ConnectionState::Open { conn, .. } => Ok(conn),
            ConnectionState::Closed => Err(TablekitError::Connection(NOT_CONNECTED.to_string())),
        }
    }

    /// Checks if there's an active database connection
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Open { .. })
    }

    /// Path of the open database file
    pub fn current_path(&self) -> Option<&Path> {
        match &self.state {
            ConnectionState::Open { path, .. } => Some(path),
            ConnectionState::Closed => None,
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        ConnectionManager::new()
    }
}

fn connection_error(err: rusqlite::Error) -> TablekitError {
    TablekitError::Connection(engine_message(&err))
}

/// Opens the file, applies the key, verifies it and applies options.
///
/// Any failure drops the handle before returning.
fn open_and_unlock(file: &DatabaseFile, options: &ConnectionOptions) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let conn = Connection::open_with_flags(&file.path, flags).map_err(connection_error)?;

    if let Some(passphrase) = file.passphrase() {
        apply_key(&conn, passphrase)?;
    }

    conn.query_row(PROBE_SQL, [], |row| row.get::<_, i64>(0))
        .map_err(connection_error)?;

    configure(&conn, options).map_err(connection_error)?;
    Ok(conn)
}

/// Submits the key before any other statement touches the file.
///
/// A plain engine ignores `PRAGMA key` and would write the file unencrypted,
/// so the key is refused unless `PRAGMA cipher_version` reports a cipher.
fn apply_key(conn: &Connection, passphrase: &str) -> Result<()> {
    let escaped = Zeroizing::new(passphrase.replace('\'', "''"));
    let pragma = Zeroizing::new(format!("PRAGMA key = '{}';", escaped.as_str()));

    // Newer cipher builds answer with a status row; drain it.
    let mut stmt = conn.prepare(&pragma).map_err(connection_error)?;
    let mut rows = stmt.query([]).map_err(connection_error)?;
    while rows.next().map_err(connection_error)?.is_some() {}
    drop(rows);
    drop(stmt);

    let cipher = conn
        .query_row("PRAGMA cipher_version;", [], |row| row.get::<_, String>(0))
        .optional()
        .map_err(connection_error)?
        .filter(|version| !version.trim().is_empty());
    match cipher {
        Some(version) => {
            debug!(cipher = %version, "applied database key");
            Ok(())
        }
        None => {
            warn!("passphrase supplied but the engine has no encryption support");
            Err(TablekitError::Connection(NO_CIPHER_SUPPORT.to_string()))
        }
    }
}

fn configure(conn: &Connection, options: &ConnectionOptions) -> rusqlite::Result<()> {
    if options.foreign_keys {
        conn.pragma_update(None, "foreign_keys", true)?;
    }

    if let Some(mode) = &options.journal_mode {
        let applied: String =
            conn.pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))?;
        debug!(journal_mode = %applied, "configured journal mode");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::schema::{Column, ColumnType};
    use crate::core::db::schema::list_tables;
    use tempfile::TempDir;

    fn notes_schema(name: &str) -> TableSchema {
        TableSchema::new(name)
            .with_column(Column::not_null("id", ColumnType::Text))
            .with_column(Column::nullable("body", ColumnType::Text))
            .with_primary_key(["id"])
    }

    fn temp_file(dir: &TempDir) -> DatabaseFile {
        DatabaseFile::new(dir.path().join("test.db"))
    }

    #[test]
    fn test_connect_and_close() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir);
        let mut manager = ConnectionManager::new();
        assert!(!manager.is_connected());

        manager
            .connect(&file, &[notes_schema("notes")], &ConnectionOptions::default())
            .unwrap();
        assert!(manager.is_connected());
        assert_eq!(manager.current_path(), Some(file.path.as_path()));
        assert_eq!(list_tables(manager.connection().unwrap()).unwrap(), vec!["notes"]);

        manager.close();
        assert!(!manager.is_connected());
        assert!(manager.current_path().is_none());
        // closing twice is harmless
        manager.close();
    }

    #[test]
    fn test_connect_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir);
        let tables = [notes_schema("notes")];
        let mut manager = ConnectionManager::new();

        manager.connect(&file, &tables, &ConnectionOptions::default()).unwrap();
        manager.connect(&file, &tables, &ConnectionOptions::default()).unwrap();
        assert!(manager.is_connected());

        // reconnecting against the existing file swallows "already exists"
        manager.close();
        manager.connect(&file, &tables, &ConnectionOptions::default()).unwrap();
        assert!(manager.is_connected());
    }

    #[test]
    fn test_not_connected() {
        let manager = ConnectionManager::new();
        match manager.connection() {
            Err(TablekitError::Connection(msg)) => assert_eq!(msg, "Not connected to database"),
            _ => panic!("Expected Connection error"),
        }
    }

    #[test]
    fn test_connection_error_handling() {
        let mut manager = ConnectionManager::new();
        let file = DatabaseFile::new("/nonexistent/path/database.db");

        match manager.connect(&file, &[], &ConnectionOptions::default()) {
            Err(TablekitError::Connection(msg)) => assert!(msg.to_lowercase().contains("unable to open")),
            other => panic!("Expected Connection error, got {:?}", other.err()),
        }
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_not_a_database() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir);
        std::fs::write(&file.path, "this is not a database file at all. ".repeat(64)).unwrap();

        let mut manager = ConnectionManager::new();
        match manager.connect(&file, &[], &ConnectionOptions::default()) {
            Err(TablekitError::Connection(msg)) => assert_eq!(msg, "File is not a database"),
            other => panic!("Expected Connection error, got {:?}", other.err()),
        }
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_failed_ddl_rolls_back_batch() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir);
        let mut manager = ConnectionManager::new();

        // "sqlite_" names are reserved by the engine
        let tables = [notes_schema("notes"), notes_schema("sqlite_reserved")];
        match manager.connect(&file, &tables, &ConnectionOptions::default()) {
            Err(TablekitError::Schema(msg)) => assert!(msg.contains("reserved")),
            other => panic!("Expected Schema error, got {:?}", other.err()),
        }

        assert!(manager.is_connected());
        assert!(list_tables(manager.connection().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_schema() {
        let dir = TempDir::new().unwrap();
        let mut manager = ConnectionManager::new();
        let tables = [notes_schema("notes").with_primary_key(Vec::<String>::new())];

        let result = manager.connect(&temp_file(&dir), &tables, &ConnectionOptions::default());
        assert!(matches!(result, Err(TablekitError::Schema(_))));
    }

    #[test]
    fn test_connection_options() {
        let dir = TempDir::new().unwrap();
        let mut manager = ConnectionManager::new();
        let options = ConnectionOptions {
            foreign_keys: true,
            journal_mode: Some("wal".to_string()),
        };

        manager.connect(&temp_file(&dir), &[], &options).unwrap();
        let conn = manager.connection().unwrap();

        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_passphrase_handling() {
        let file = DatabaseFile::new("x.db").with_passphrase("");
        assert!(file.passphrase().is_none());

        let file = DatabaseFile::new("x.db").with_passphrase("s3cret");
        assert_eq!(file.passphrase(), Some("s3cret"));
        assert!(!format!("{:?}", file).contains("s3cret"));
    }

    #[cfg(not(feature = "sqlcipher"))]
    #[test]
    fn test_passphrase_rejected_without_cipher() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).with_passphrase("secret");
        let mut manager = ConnectionManager::new();

        match manager.connect(&file, &[notes_schema("notes")], &ConnectionOptions::default()) {
            Err(TablekitError::Connection(msg)) => assert_eq!(msg, NO_CIPHER_SUPPORT),
            other => panic!("Expected Connection error, got {:?}", other.err()),
        }
        assert!(!manager.is_connected());

        // nothing was written in plaintext
        let written = std::fs::read(&file.path).unwrap_or_default();
        assert!(!written.starts_with(b"SQLite format 3"));
    }

    #[cfg(feature = "sqlcipher")]
    #[test]
    fn test_wrong_passphrase() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.db");
        let tables = [notes_schema("notes")];

        let mut manager = ConnectionManager::new();
        let right = DatabaseFile::new(&path).with_passphrase("right horse");
        manager.connect(&right, &tables, &ConnectionOptions::default()).unwrap();
        manager.close();

        let wrong = DatabaseFile::new(&path).with_passphrase("wrong horse");
        match manager.connect(&wrong, &tables, &ConnectionOptions::default()) {
            Err(TablekitError::Connection(msg)) => assert_eq!(msg, "File is not a database"),
            other => panic!("Expected Connection error, got {:?}", other.err()),
        }
        assert!(!manager.is_connected());

        manager.connect(&right, &tables, &ConnectionOptions::default()).unwrap();
        assert!(manager.is_connected());
    }
}
