/// Schema Model Module
///
/// This module describes tables the way callers declare them: typed,
/// constrained columns plus an ordered (possibly composite) primary key.
/// It also rebuilds the same description from an existing database so a
/// caller can check what the engine actually materialized.

use crate::core::{Result, TablekitError};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Float,
    Blob,
}

impl ColumnType {
    /// Canonical SQL type name used in DDL
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Blob => "BLOB",
        }
    }

    /// Maps a declared SQL type back to a column type using SQLite's
    /// affinity rules.
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.to_uppercase();

        if declared.contains("INT") {
            ColumnType::Integer
        } else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT") {
            ColumnType::Text
        } else if declared.is_empty() || declared.contains("BLOB") {
            ColumnType::Blob
        } else {
            ColumnType::Float
        }
    }
}

/// Nullability constraint of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    NotNull,
    #[default]
    Nullable,
}

impl Constraint {
    /// Canonical constraint token used in DDL
    pub fn sql_token(self) -> &'static str {
        match self {
            Constraint::NotNull => "NOT NULL",
            Constraint::Nullable => "NULL",
        }
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Storage type
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Whether NULL is accepted
    #[serde(default)]
    pub constraint: Constraint,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, constraint: Constraint) -> Self {
        Column {
            name: name.into(),
            column_type,
            constraint,
        }
    }

    pub fn not_null(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column::new(name, column_type, Constraint::NotNull)
    }

    pub fn nullable(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column::new(name, column_type, Constraint::Nullable)
    }

    /// Creates a Column from a `pragma_table_info` row
    /// (name, type, notnull, pk)
    fn from_pragma_row(row: &Row) -> rusqlite::Result<(Self, i64)> {
        let declared: String = row.get(1)?;
        let notnull: bool = row.get(2)?;
        let column = Column {
            name: row.get(0)?,
            column_type: ColumnType::from_declared(&declared),
            constraint: if notnull {
                Constraint::NotNull
            } else {
                Constraint::Nullable
            },
        };
        Ok((column, row.get(3)?))
    }
}

/// A table definition as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Primary key column names in declaration order
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Appends a column
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Replaces the primary key
    pub fn with_primary_key<I, S>(mut self, key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = key.into_iter().map(Into::into).collect();
        self
    }

    /// Looks up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks the schema is well formed before any DDL is issued.
    ///
    /// # Errors
    ///
    /// Returns `TablekitError::Schema` when a name is not a plain identifier,
    /// the table has no columns, a column is declared twice, the primary key
    /// is empty, or the primary key names an undeclared column.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(TablekitError::Schema(format!(
                "invalid table name '{}'",
                self.name
            )));
        }

        if self.columns.is_empty() {
            return Err(TablekitError::Schema(format!(
                "table '{}' has no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(TablekitError::Schema(format!(
                    "invalid column name '{}' in table '{}'",
                    column.name, self.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TablekitError::Schema(format!(
                    "duplicate column '{}' in table '{}'",
                    column.name, self.name
                )));
            }
        }

        if self.primary_key.is_empty() {
            return Err(TablekitError::Schema(format!(
                "table '{}' has an empty primary key",
                self.name
            )));
        }

        for key in &self.primary_key {
            if !seen.contains(key.as_str()) {
                return Err(TablekitError::Schema(format!(
                    "primary key column '{}' is not a column of table '{}'",
                    key, self.name
                )));
            }
        }

        Ok(())
    }
}

/// Returns true when `name` is a plain SQL identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Lists user-defined tables in the database, sorted by name
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type='table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(names)
}

/// Rebuilds the schema of an existing table.
///
/// Returns `Ok(None)` when the table does not exist. The primary key is
/// ordered by key position, not by column position.
pub fn describe_table(conn: &Connection, table_name: &str) -> Result<Option<TableSchema>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;

    let entries = stmt
        .query_map([table_name], |row| Column::from_pragma_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if entries.is_empty() {
        return Ok(None);
    }

    let mut keyed: Vec<(i64, String)> = entries
        .iter()
        .filter(|(_, position)| *position > 0)
        .map(|(column, position)| (*position, column.name.clone()))
        .collect();
    keyed.sort_by_key(|(position, _)| *position);

    Ok(Some(TableSchema {
        name: table_name.to_string(),
        columns: entries.into_iter().map(|(column, _)| column).collect(),
        primary_key: keyed.into_iter().map(|(_, name)| name).collect(),
    }))
}
