//! Live catalog introspection.
//!
//! Nothing here is cached: every lookup reads the catalog of the connection
//! it is given, so a table created a moment ago is visible immediately and a
//! dropped one is rejected.

use rusqlite::Connection;
use serde::Serialize;

use super::error::{CrudError, CrudResult};

/// Storage affinity derived from a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
    Numeric,
}

impl DataType {
    /// Apply SQLite's affinity rules to a declared type, in their order of
    /// precedence.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            DataType::Integer
        } else if ["CHAR", "CLOB", "TEXT"].iter().any(|t| upper.contains(t)) {
            DataType::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            DataType::Blob
        } else if ["REAL", "FLOA", "DOUB"].iter().any(|t| upper.contains(t)) {
            DataType::Real
        } else {
            DataType::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// All tables in catalog order.
pub fn list_tables(conn: &Connection) -> CrudResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tables)
}

/// Resolve a caller-supplied table name to the name stored in the catalog.
pub fn resolve_table(conn: &Connection, table: &str) -> CrudResult<String> {
    list_tables(conn)?
        .into_iter()
        .find(|name| name.eq_ignore_ascii_case(table))
        .ok_or_else(|| CrudError::UnknownTable(table.to_string()))
}

/// Column names of `table` in declaration order.
pub fn list_columns(conn: &Connection, table: &str) -> CrudResult<Vec<String>> {
    Ok(describe_table(conn, table)?.column_names())
}

pub fn describe_table(conn: &Connection, table: &str) -> CrudResult<TableInfo> {
    let name = resolve_table(conn, table)?;
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([&name], |row| {
            let declared_type: String = row.get(1)?;
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: DataType::from_declared(&declared_type),
                declared_type,
                not_null: row.get::<_, i64>(2)? != 0,
                default_value: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TableInfo { name, columns })
}

/// Resolve `column` against an introspected column list.
pub fn resolve_column(table: &str, columns: &[String], column: &str) -> CrudResult<String> {
    columns
        .iter()
        .find(|name| name.eq_ignore_ascii_case(column))
        .cloned()
        .ok_or_else(|| CrudError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}
