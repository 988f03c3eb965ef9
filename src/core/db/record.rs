/// Record Module
///
/// Field/row values exchanged with callers. Every value is carried as text;
/// the engine coerces it to the column's storage type on write.

use crate::core::error::EMPTY_TABLE;
use crate::core::{Result, TablekitError};
use serde::{Deserialize, Serialize};

/// A single column/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One record, fields in column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub fields: Vec<Field>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    /// Appends a field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Returns the value of the named field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<Field>> for Row {
    fn from(fields: Vec<Field>) -> Self {
        Row { fields }
    }
}

/// Outcome of a read operation.
///
/// A query that matched nothing is `Empty`, never an error. Callers that
/// want the older "empty table is an error" behaviour use
/// [`Records::require_rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Records {
    Rows(Vec<Row>),
    Empty,
}

impl Records {
    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        if rows.is_empty() {
            Records::Empty
        } else {
            Records::Rows(rows)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Records::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            Records::Rows(rows) => rows.len(),
            Records::Empty => 0,
        }
    }

    /// Rows as a plain vector; `Empty` becomes an empty vector
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Records::Rows(rows) => rows,
            Records::Empty => Vec::new(),
        }
    }

    /// Rows, or `TablekitError::EmptyResult` when nothing matched
    pub fn require_rows(self) -> Result<Vec<Row>> {
        match self {
            Records::Rows(rows) => Ok(rows),
            Records::Empty => Err(TablekitError::EmptyResult(EMPTY_TABLE.to_string())),
        }
    }
}
