/// Database Facade Module
///
/// CRUD facade over a single connection.
///
/// `Database` is what callers hold: connect once with the table schemas,
/// then insert, query, update and delete rows described as text fields.
/// Every operation checks the connection before building SQL.

use crate::config::Config;
use crate::core::db::builder::{self, Combinator, Statement};
use crate::core::db::schema;
use crate::core::db::{
    ConnectionManager, ConnectionOptions, DatabaseFile, Field, QueryExecutor, QueryResult,
    Records, Row, TableSchema,
};
use crate::core::error::EMPTY_TABLE;
use crate::core::{Result, TablekitError};
use std::path::Path;
use tracing::debug;

/// A connection plus the generic table operations
#[derive(Default)]
pub struct Database {
    manager: ConnectionManager,
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    /// Opens `file` and creates any of `tables` that do not exist yet.
    ///
    /// A no-op when already connected.
    pub fn connect(&mut self, file: &DatabaseFile, tables: &[TableSchema]) -> Result<()> {
        self.connect_with_options(file, tables, &ConnectionOptions::default())
    }

    /// Like [`Database::connect`], applying connection pragmas first.
    pub fn connect_with_options(
        &mut self,
        file: &DatabaseFile,
        tables: &[TableSchema],
        options: &ConnectionOptions,
    ) -> Result<()> {
        self.manager.connect(file, tables, options)
    }

    /// Connects using the file, options and tables of a loaded config.
    pub fn connect_with_config(&mut self, config: &Config) -> Result<()> {
        let file = config.database_file()?;
        self.connect_with_options(&file, &config.tables, &config.sqlite)
    }

    /// Closes the connection; later operations fail until reconnected.
    pub fn close(&mut self) {
        self.manager.close();
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Path of the open database file
    pub fn path(&self) -> Option<&Path> {
        self.manager.current_path()
    }

    fn executor(&self) -> Result<QueryExecutor<'_>> {
        Ok(QueryExecutor::new(self.manager.connection()?))
    }

    /// Inserts one row.
    ///
    /// # Errors
    ///
    /// `TablekitError::Builder` when the row has no fields, or
    /// `TablekitError::Engine` when the engine rejects it (for example a
    /// duplicate primary key).
    pub fn insert_row(&self, table: &str, row: &Row) -> Result<()> {
        let executor = self.executor()?;
        executor.execute(&builder::insert(table, &row.fields)?)?;
        Ok(())
    }

    /// Deletes the rows where `field` matches; returns how many were removed.
    pub fn delete_row(&self, table: &str, field: &Field) -> Result<usize> {
        let executor = self.executor()?;
        let result = executor.execute(&builder::delete(table, field)?)?;
        debug!(table, removed = result.rows_affected, "deleted rows");
        Ok(result.rows_affected)
    }

    /// Counts every row of `table`
    pub fn count_records(&self, table: &str) -> Result<usize> {
        let executor = self.executor()?;
        count_with(&executor, &builder::count(table, None)?)
    }

    /// Counts the rows of `table` where `field` matches
    pub fn count_records_where(&self, table: &str, field: &Field) -> Result<usize> {
        let executor = self.executor()?;
        count_with(&executor, &builder::count(table, Some(field))?)
    }

    /// Every row of `table`
    pub fn get_records(&self, table: &str) -> Result<Records> {
        self.get_records_by_with_sort(table, &[], None, Combinator::And)
    }

    /// Rows where a single field matches
    pub fn get_records_where(&self, table: &str, field: &Field) -> Result<Records> {
        self.get_records_by(table, std::slice::from_ref(field))
    }

    /// Rows matching every one of `keys`
    pub fn get_records_by(&self, table: &str, keys: &[Field]) -> Result<Records> {
        self.get_records_by_with_sort(table, keys, None, Combinator::And)
    }

    /// Every row of `table`, ascending by `column`
    pub fn get_records_with_sort_by(&self, table: &str, column: &str) -> Result<Records> {
        self.get_records_by_with_sort(table, &[], Some(column), Combinator::And)
    }

    /// Rows matching `keys` joined by `combinator`, optionally sorted.
    ///
    /// Zero matching rows is `Records::Empty`, not an error.
    pub fn get_records_by_with_sort(
        &self,
        table: &str,
        keys: &[Field],
        sort_by: Option<&str>,
        combinator: Combinator,
    ) -> Result<Records> {
        let executor = self.executor()?;
        let statement = builder::select(table, keys, sort_by, combinator)?;
        Ok(Records::from_rows(executor.execute(&statement)?.into_rows()))
    }

    /// Runs caller-written SQL and returns its rows
    pub fn get_records_using_custom_query(&self, sql: &str) -> Result<Records> {
        let executor = self.executor()?;
        Ok(Records::from_rows(executor.execute_raw(sql)?.into_rows()))
    }

    /// Runs caller-written SQL verbatim and returns the raw result,
    /// including the number of rows changed by DML.
    pub fn custom_query(&self, sql: &str) -> Result<QueryResult> {
        let executor = self.executor()?;
        executor.execute(&Statement::raw(sql))
    }

    /// Sets `set_fields` on the rows where `where_field` matches; returns
    /// how many rows changed.
    pub fn update_record(
        &self,
        table: &str,
        where_field: &Field,
        set_fields: &[Field],
    ) -> Result<usize> {
        let executor = self.executor()?;
        let result = executor.execute(&builder::update(table, where_field, set_fields)?)?;
        debug!(table, updated = result.rows_affected, "updated rows");
        Ok(result.rows_affected)
    }

    /// User tables present in the database, sorted by name
    pub fn table_names(&self) -> Result<Vec<String>> {
        schema::list_tables(self.manager.connection()?)
    }

    /// Schema of an existing table, `None` if it does not exist
    pub fn describe_table(&self, table: &str) -> Result<Option<TableSchema>> {
        schema::describe_table(self.manager.connection()?, table)
    }
}

fn count_with(executor: &QueryExecutor<'_>, statement: &Statement) -> Result<usize> {
    match executor.query_scalar(statement)? {
        Some(count) => usize::try_from(count)
            .map_err(|_| TablekitError::Engine(format!("Invalid row count {}", count))),
        None => Err(TablekitError::EmptyResult(EMPTY_TABLE.to_string())),
    }
}
