/// Statement Builder Module
///
/// Pure functions turning a table name plus fields (or a table schema) into
/// a `Statement`: SQL text with numbered placeholders and the ordered list of
/// values to bind. Values never appear in the SQL text. Identifiers are
/// double-quoted.

use crate::core::db::record::Field;
use crate::core::db::schema::TableSchema;
use crate::core::{Result, TablekitError};
use std::fmt;

/// SQL text plus the values bound to its placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<String>,
}

impl Statement {
    /// Creates a statement with no bound values
    pub fn raw(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}

/// How compound key filters are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

/// Quotes an identifier, doubling embedded quotes
fn quote(identifier: &str) -> Result<String> {
    if identifier.is_empty() {
        return Err(TablekitError::Builder("empty identifier".to_string()));
    }
    Ok(format!("\"{}\"", identifier.replace('"', "\"\"")))
}

/// Appends `"name" = ?N` for each field, joined by `separator`, and pushes
/// the values onto `params`.
fn push_assignments(
    sql: &mut String,
    params: &mut Vec<String>,
    fields: &[Field],
    separator: &str,
) -> Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            sql.push_str(separator);
        }
        params.push(field.value.clone());
        sql.push_str(&format!("{} = ?{}", quote(&field.name)?, params.len()));
    }
    Ok(())
}

/// `CREATE TABLE "t"("c" TYPE CONSTRAINT, ..., PRIMARY KEY ("k1","k2"));`
///
/// # Errors
///
/// Returns `TablekitError::Schema` if the schema does not validate.
pub fn create_table(schema: &TableSchema) -> Result<Statement> {
    schema.validate()?;

    let mut sql = format!("CREATE TABLE {}(", quote(&schema.name)?);
    for column in &schema.columns {
        sql.push_str(&format!(
            "{} {} {}, ",
            quote(&column.name)?,
            column.column_type.sql_name(),
            column.constraint.sql_token()
        ));
    }

    let keys = schema
        .primary_key
        .iter()
        .map(|k| quote(k))
        .collect::<Result<Vec<_>>>()?;
    sql.push_str(&format!("PRIMARY KEY ({}));", keys.join(",")));

    Ok(Statement::raw(sql))
}

/// `INSERT INTO "t"("a","b") VALUES (?1, ?2);`
///
/// # Errors
///
/// Returns `TablekitError::Builder` if `fields` is empty.
pub fn insert(table: &str, fields: &[Field]) -> Result<Statement> {
    if fields.is_empty() {
        return Err(TablekitError::Builder(format!(
            "no fields to insert into '{}'",
            table
        )));
    }

    let names = fields
        .iter()
        .map(|f| quote(&f.name))
        .collect::<Result<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();

    Ok(Statement {
        sql: format!(
            "INSERT INTO {}({}) VALUES ({});",
            quote(table)?,
            names.join(","),
            placeholders.join(", ")
        ),
        params: fields.iter().map(|f| f.value.clone()).collect(),
    })
}

/// `DELETE FROM "t" WHERE "f" = ?1;`
pub fn delete(table: &str, field: &Field) -> Result<Statement> {
    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = ?1;",
            quote(table)?,
            quote(&field.name)?
        ),
        params: vec![field.value.clone()],
    })
}

/// `SELECT COUNT(*) FROM "t" [WHERE "f" = ?1];`
pub fn count(table: &str, field: Option<&Field>) -> Result<Statement> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote(table)?);
    let mut params = Vec::new();

    if let Some(field) = field {
        sql.push_str(" WHERE ");
        push_assignments(&mut sql, &mut params, std::slice::from_ref(field), "")?;
    }
    sql.push(';');

    Ok(Statement { sql, params })
}

/// `SELECT * FROM "t" [WHERE "k1" = ?1 AND|OR "k2" = ?2 ...] [ORDER BY "s"];`
///
/// An empty `keys` slice selects every row.
pub fn select(
    table: &str,
    keys: &[Field],
    sort_by: Option<&str>,
    combinator: Combinator,
) -> Result<Statement> {
    let mut sql = format!("SELECT * FROM {}", quote(table)?);
    let mut params = Vec::new();

    if !keys.is_empty() {
        sql.push_str(" WHERE ");
        push_assignments(&mut sql, &mut params, keys, &format!(" {} ", combinator))?;
    }

    if let Some(column) = sort_by {
        sql.push_str(&format!(" ORDER BY {}", quote(column)?));
    }
    sql.push(';');

    Ok(Statement { sql, params })
}

/// `UPDATE "t" SET "a" = ?1, "b" = ?2 WHERE "w" = ?3;`
///
/// # Errors
///
/// Returns `TablekitError::Builder` if `set_fields` is empty.
pub fn update(table: &str, where_field: &Field, set_fields: &[Field]) -> Result<Statement> {
    if set_fields.is_empty() {
        return Err(TablekitError::Builder(format!(
            "no fields to update in '{}'",
            table
        )));
    }

    let mut sql = format!("UPDATE {} SET ", quote(table)?);
    let mut params = Vec::new();
    push_assignments(&mut sql, &mut params, set_fields, ", ")?;
    sql.push_str(" WHERE ");
    push_assignments(&mut sql, &mut params, std::slice::from_ref(where_field), "")?;
    sql.push(';');

    Ok(Statement { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::schema::{Column, ColumnType};

    fn fields() -> Vec<Field> {
        vec![Field::new("id", "1"), Field::new("name", "a")]
    }

    #[test]
    fn test_create_table_composite_key() {
        let schema = TableSchema::new("memberships")
            .with_column(Column::not_null("user_id", ColumnType::Text))
            .with_column(Column::not_null("group_id", ColumnType::Integer))
            .with_column(Column::nullable("score", ColumnType::Float))
            .with_column(Column::nullable("avatar", ColumnType::Blob))
            .with_primary_key(["user_id", "group_id"]);

        let stmt = create_table(&schema).unwrap();
        insta::assert_snapshot!(
            stmt.sql(),
            @r#"CREATE TABLE "memberships"("user_id" TEXT NOT NULL, "group_id" INTEGER NOT NULL, "score" FLOAT NULL, "avatar" BLOB NULL, PRIMARY KEY ("user_id","group_id"));"#
        );
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_create_table_rejects_invalid_schema() {
        let schema = TableSchema::new("t").with_column(Column::not_null("id", ColumnType::Text));
        assert!(matches!(create_table(&schema), Err(TablekitError::Schema(_))));
    }

    #[test]
    fn test_insert() {
        let stmt = insert("users", &fields()).unwrap();
        insta::assert_snapshot!(stmt.sql(), @r#"INSERT INTO "users"("id","name") VALUES (?1, ?2);"#);
        assert_eq!(stmt.params(), ["1", "a"]);
    }

    #[test]
    fn test_insert_requires_fields() {
        match insert("users", &[]) {
            Err(TablekitError::Builder(msg)) => assert!(msg.contains("users")),
            other => panic!("Expected Builder error, got {:?}", other),
        }
    }

    #[test]
    fn test_values_are_bound_not_interpolated() {
        let stmt = delete("users", &Field::new("name", "o'brien")).unwrap();
        assert_eq!(stmt.sql(), r#"DELETE FROM "users" WHERE "name" = ?1;"#);
        assert_eq!(stmt.params(), ["o'brien"]);
    }

    #[test]
    fn test_identifier_quoting() {
        let stmt = count("we\"ird", None).unwrap();
        assert_eq!(stmt.sql(), r#"SELECT COUNT(*) FROM "we""ird";"#);

        assert!(matches!(
            delete("", &Field::new("id", "1")),
            Err(TablekitError::Builder(_))
        ));
    }

    #[test]
    fn test_count() {
        assert_eq!(count("users", None).unwrap().sql(), r#"SELECT COUNT(*) FROM "users";"#);

        let stmt = count("users", Some(&Field::new("name", "a"))).unwrap();
        assert_eq!(stmt.sql(), r#"SELECT COUNT(*) FROM "users" WHERE "name" = ?1;"#);
        assert_eq!(stmt.params(), ["a"]);
    }

    #[test]
    fn test_select_shapes() {
        let plain = select("users", &[], None, Combinator::And).unwrap();
        assert_eq!(plain.sql(), r#"SELECT * FROM "users";"#);

        let sorted = select("users", &[], Some("id"), Combinator::And).unwrap();
        assert_eq!(sorted.sql(), r#"SELECT * FROM "users" ORDER BY "id";"#);

        let either = select("users", &fields(), Some("name"), Combinator::Or).unwrap();
        insta::assert_snapshot!(
            either.sql(),
            @r#"SELECT * FROM "users" WHERE "id" = ?1 OR "name" = ?2 ORDER BY "name";"#
        );
        assert_eq!(either.params(), ["1", "a"]);

        let both = select("users", &fields(), None, Combinator::And).unwrap();
        assert_eq!(both.sql(), r#"SELECT * FROM "users" WHERE "id" = ?1 AND "name" = ?2;"#);
    }

    #[test]
    fn test_update() {
        let set = vec![Field::new("name", "x"), Field::new("age", "3")];
        let stmt = update("users", &Field::new("id", "1"), &set).unwrap();
        insta::assert_snapshot!(
            stmt.sql(),
            @r#"UPDATE "users" SET "name" = ?1, "age" = ?2 WHERE "id" = ?3;"#
        );
        assert_eq!(stmt.params(), ["x", "3", "1"]);

        assert!(matches!(
            update("users", &Field::new("id", "1"), &[]),
            Err(TablekitError::Builder(_))
        ));
    }
}
