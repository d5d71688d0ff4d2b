//! The generic record engine.
//!
//! Table and column names cannot be bound as parameters, only values can.
//! So every identifier that reaches statement text here has first been
//! resolved against the live catalog (see [`schema`]) and is then quoted;
//! every value travels as a positional parameter.

use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use super::error::{CrudError, CrudResult};
use super::rules::RuleRegistry;
use super::schema;
use super::{quote_identifier, Filter, Record, ResultSet, SqlQuery, Value};

/// Builds and runs one INSERT, SELECT, UPDATE or DELETE per call against a
/// caller-chosen table.
#[derive(Debug, Clone, Default)]
pub struct RecordEngine {
    rules: RuleRegistry,
}

impl RecordEngine {
    pub fn new(rules: RuleRegistry) -> Self {
        Self { rules }
    }

    pub fn list_tables(&self, conn: &Connection) -> CrudResult<Vec<String>> {
        schema::list_tables(conn)
    }

    pub fn list_columns(&self, conn: &Connection, table: &str) -> CrudResult<Vec<String>> {
        schema::list_columns(conn, table)
    }

    /// Insert one row. Input rules run before any statement for the write;
    /// store-reading rules run in the same immediate transaction as the
    /// INSERT.
    pub fn insert(&self, conn: &Connection, table: &str, record: &Record) -> CrudResult<usize> {
        if record.is_empty() {
            return Err(CrudError::Validation("no values supplied for insert".to_string()));
        }
        let table = schema::resolve_table(conn, table)?;
        let columns = schema::list_columns(conn, &table)?;
        let mut record = resolve_record(&table, &columns, record)?;
        self.rules.normalize(&table, &mut record)?;

        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        self.rules.before_insert(&tx, &table, &mut record)?;
        let affected = execute(&tx, &build_insert(&table, &record))?;
        tx.commit()?;
        Ok(affected)
    }

    /// `SELECT *`, optionally narrowed by `filter`.
    pub fn select(&self, conn: &Connection, table: &str, filter: Option<&Filter>) -> CrudResult<ResultSet> {
        let table = schema::resolve_table(conn, table)?;
        let query = match filter {
            None => build_select(&table, None),
            Some(filter) => {
                let columns = schema::list_columns(conn, &table)?;
                let column = schema::resolve_column(&table, &columns, &filter.column)?;
                build_select(&table, Some((&column, &filter.value)))
            }
        };
        query_result_set(conn, &query)
    }

    /// Update the rows matching `filter`. Fails with `RecordNotFound` when
    /// nothing matches.
    pub fn update(
        &self,
        conn: &Connection,
        table: &str,
        filter: &Filter,
        record: &Record,
    ) -> CrudResult<usize> {
        if record.is_empty() {
            return Err(CrudError::Validation("no values supplied for update".to_string()));
        }
        let table = schema::resolve_table(conn, table)?;
        let columns = schema::list_columns(conn, &table)?;
        let filter_column = schema::resolve_column(&table, &columns, &filter.column)?;
        let mut record = resolve_record(&table, &columns, record)?;
        self.rules.normalize(&table, &mut record)?;

        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        if !exists(&tx, &table, &filter_column, &filter.value)? {
            return Err(CrudError::RecordNotFound {
                table,
                column: filter_column,
                value: filter.value.to_string(),
            });
        }
        self.rules.before_update(&tx, &table, &mut record)?;
        let affected = execute(&tx, &build_update(&table, &record, &filter_column, &filter.value))?;
        tx.commit()?;
        Ok(affected)
    }

    /// Delete the rows matching `filter`. Matching nothing is not an error.
    pub fn delete(&self, conn: &Connection, table: &str, filter: &Filter) -> CrudResult<usize> {
        let table = schema::resolve_table(conn, table)?;
        let columns = schema::list_columns(conn, &table)?;
        let column = schema::resolve_column(&table, &columns, &filter.column)?;
        execute(conn, &build_delete(&table, &column, &filter.value))
    }
}

/// Run a row-returning statement and collect every row.
pub fn query_result_set(conn: &Connection, query: &SqlQuery) -> CrudResult<ResultSet> {
    debug!(statement = %query.statement, params = query.params.len(), "query");
    let mut stmt = conn.prepare(&query.statement)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|i| row.get::<_, Value>(i))
            .collect::<Result<Vec<_>, _>>()?;
        result.push(values);
    }
    Ok(ResultSet {
        columns,
        rows: result,
    })
}

fn execute(conn: &Connection, query: &SqlQuery) -> CrudResult<usize> {
    debug!(statement = %query.statement, params = query.params.len(), "execute");
    Ok(conn.execute(&query.statement, params_from_iter(query.params.iter()))?)
}

fn exists(conn: &Connection, table: &str, column: &str, value: &Value) -> CrudResult<bool> {
    let statement = format!(
        "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
        quote_identifier(table),
        quote_identifier(column)
    );
    debug!(%statement, "existence check");
    let found = conn
        .query_row(&statement, [value], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Re-key `record` with catalog spellings, rejecting unknown columns.
fn resolve_record(table: &str, columns: &[String], record: &Record) -> CrudResult<Record> {
    let mut resolved = Record::new();
    for (column, value) in record.iter() {
        let name = schema::resolve_column(table, columns, column)?;
        resolved.insert(&name, value.clone());
    }
    Ok(resolved)
}

fn build_insert(table: &str, record: &Record) -> SqlQuery {
    let columns: Vec<String> = record.columns().map(quote_identifier).collect();
    let placeholders: Vec<String> = (1..=record.len()).map(|i| format!("?{}", i)).collect();
    SqlQuery {
        statement: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params: record.values().cloned().collect(),
    }
}

fn build_select(table: &str, filter: Option<(&str, &Value)>) -> SqlQuery {
    let select = format!("SELECT * FROM {}", quote_identifier(table));
    match filter {
        None => SqlQuery::new(select),
        Some((column, value)) => SqlQuery::new(format!(
            "{} WHERE {} = ?1",
            select,
            quote_identifier(column)
        ))
        .with_param(value.clone()),
    }
}

fn build_update(table: &str, record: &Record, filter_column: &str, filter_value: &Value) -> SqlQuery {
    let assignments: Vec<String> = record
        .columns()
        .enumerate()
        .map(|(i, column)| format!("{} = ?{}", quote_identifier(column), i + 1))
        .collect();
    let mut params: Vec<Value> = record.values().cloned().collect();
    params.push(filter_value.clone());
    SqlQuery {
        statement: format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(table),
            assignments.join(", "),
            quote_identifier(filter_column),
            params.len()
        ),
        params,
    }
}

fn build_delete(table: &str, column: &str, value: &Value) -> SqlQuery {
    SqlQuery::new(format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote_identifier(table),
        quote_identifier(column)
    ))
    .with_param(value.clone())
}
