/// Query Execution Module
///
/// This module executes a single statement per call against an open
/// connection and materializes the result as text. Prepared statements are
/// never cached; each call prepares, steps, collects and finalizes.

use crate::core::db::builder::Statement;
use crate::core::db::record::{Field, Row};
use crate::core::Result;
use rusqlite::{params_from_iter, types::ValueRef, Connection, OptionalExtension};
use tracing::debug;

/// Represents the result of a SQL statement execution
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column names from the engine metadata
    pub columns: Vec<String>,
    /// Rows of data as string values, in engine order
    pub rows: Vec<Vec<String>>,
    /// Number of rows returned
    pub row_count: usize,
    /// Rows changed by an INSERT, UPDATE or DELETE (0 otherwise)
    pub rows_affected: usize,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
            rows_affected: 0,
        }
    }

    /// Pairs every value with its column name
    pub fn into_rows(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .zip(values)
                    .map(|(name, value)| Field::new(name.clone(), value))
                    .collect::<Vec<_>>()
                    .into()
            })
            .collect()
    }
}

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// Executes a statement and collects every row it returns
    ///
    /// # Errors
    ///
    /// Returns `TablekitError::Engine` with the normalized engine message if
    /// the statement cannot be prepared or fails while stepping.
    pub fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        debug!(
            sql = statement.sql(),
            params = statement.params().len(),
            "executing statement"
        );

        let mut stmt = self.connection.prepare(statement.sql())?;
        let writes = !stmt.readonly();
        let changes_before = if writes { total_changes(self.connection)? } else { 0 };

        // Get column names
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();

        let mut rows = stmt.query(params_from_iter(statement.params()))?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(format_value(row.get_ref(i)?));
            }
            collected.push(values);
        }
        drop(rows);
        drop(stmt);

        let mut result = QueryResult::new(columns, collected);
        // `changes()` keeps the last DML count across DDL, so only trust it
        // when this statement moved the connection's running total.
        if writes && total_changes(self.connection)? != changes_before {
            result.rows_affected = usize::try_from(self.connection.changes()).unwrap_or(0);
        }

        debug!(
            rows = result.row_count,
            affected = result.rows_affected,
            "statement finished"
        );
        Ok(result)
    }

    /// Executes caller-supplied SQL verbatim, without bound values
    pub fn execute_raw(&self, sql: &str) -> Result<QueryResult> {
        self.execute(&Statement::raw(sql))
    }

    /// Runs a statement whose first column of the first row is an integer.
    ///
    /// Returns `Ok(None)` when the statement produced no row.
    pub fn query_scalar(&self, statement: &Statement) -> Result<Option<i64>> {
        debug!(sql = statement.sql(), "executing scalar query");

        let mut stmt = self.connection.prepare(statement.sql())?;
        let value = stmt
            .query_row(params_from_iter(statement.params()), |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(value)
    }
}

/// Rows inserted, updated or deleted since the connection was opened
fn total_changes(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

/// Converts an engine value to its text representation.
///
/// NULL becomes the empty string.
fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format_real(f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => String::from_utf8_lossy(b).to_string(),
    }
}

/// Renders a float the way the engine's `%!.15g` text conversion does:
/// 15 significant digits, exponent form outside `1e-4..1e15`, and a mantissa
/// that always carries a fractional digit.
fn format_real(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }

    let scientific = format!("{:.14e}", value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if mantissa.starts_with('-') { "-" } else { "" };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    if !(-4..15).contains(&exponent) {
        let (lead, rest) = digits.split_at(1);
        let rest = if rest.is_empty() { "0" } else { rest };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}{}.{}e{}{:02}", sign, lead, rest, exp_sign, exponent.unsigned_abs())
    } else if exponent >= 0 {
        let int_len = exponent as usize + 1;
        if digits.len() > int_len {
            let (int_part, frac) = digits.split_at(int_len);
            format!("{}{}.{}", sign, int_part, frac)
        } else {
            format!("{}{:0<width$}.0", sign, digits, width = int_len)
        }
    } else {
        let zeros = "0".repeat((-exponent - 1) as usize);
        format!("{}0.{}{}", sign, zeros, digits)
    }
}
