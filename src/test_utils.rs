/// # Test Utilities Module
///
/// Isolated database fixtures for unit tests. Every fixture lives in its own
/// temporary directory, removed when the fixture is dropped.

use crate::core::db::{Column, ColumnType, DatabaseFile, Row, TableSchema};
use crate::core::Result;
use crate::database::Database;
use tempfile::TempDir;

/// `users(id TEXT NOT NULL, name TEXT NULL, age INTEGER NULL, PRIMARY KEY (id))`
pub fn users_schema() -> TableSchema {
    TableSchema::new("users")
        .with_column(Column::not_null("id", ColumnType::Text))
        .with_column(Column::nullable("name", ColumnType::Text))
        .with_column(Column::nullable("age", ColumnType::Integer))
        .with_primary_key(["id"])
}

/// Table with a two-column primary key
pub fn memberships_schema() -> TableSchema {
    TableSchema::new("memberships")
        .with_column(Column::not_null("user_id", ColumnType::Text))
        .with_column(Column::not_null("group_id", ColumnType::Integer))
        .with_column(Column::nullable("score", ColumnType::Float))
        .with_primary_key(["user_id", "group_id"])
}

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub db: Database,
    _dir: TempDir,
}

impl DatabaseFixture {
    /// Connected database with the standard schema and no rows
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let file = DatabaseFile::new(dir.path().join("fixture.db"));

        let mut db = Database::new();
        db.connect(&file, &[users_schema(), memberships_schema()])?;

        Ok(DatabaseFixture { db, _dir: dir })
    }

    /// Fixture with three users: alice (30), bob (no age), carol (41)
    pub fn with_sample_data() -> Result<Self> {
        let fixture = Self::new()?;

        let rows = [
            Row::new().with("id", "1").with("name", "alice").with("age", "30"),
            Row::new().with("id", "2").with("name", "bob"),
            Row::new().with("id", "3").with("name", "carol").with("age", "41"),
        ];
        for row in &rows {
            fixture.db.insert_row("users", row)?;
        }

        Ok(fixture)
    }
}
