//! Table-keyed checks run by the engine before a write.
//!
//! The engine never special-cases a table by name. Anything table-specific
//! is a [`RecordRule`] registered in a [`RuleRegistry`], either for one table
//! or globally.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use super::error::{CrudError, CrudResult};
use super::schema;
use super::{quote_identifier, Record, Value};

/// A check consulted before a record is written.
///
/// `normalize` sees only the submitted record and runs before the engine
/// issues any statement for the write. The `before_*` hooks may read the
/// store through `conn`; they run inside the write's transaction, so what
/// they read is what the write sees.
pub trait RecordRule: Send + Sync + fmt::Debug {
    fn normalize(&self, _record: &mut Record) -> CrudResult<()> {
        Ok(())
    }

    fn before_insert(&self, _conn: &Connection, _table: &str, _record: &mut Record) -> CrudResult<()> {
        Ok(())
    }

    fn before_update(&self, _conn: &Connection, _table: &str, _record: &mut Record) -> CrudResult<()> {
        Ok(())
    }
}

/// Rules keyed by table name, plus rules that apply to every table.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    global: Vec<Arc<dyn RecordRule>>,
    by_table: HashMap<String, Vec<Arc<dyn RecordRule>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the plant shop: quantities are non-negative integers
    /// everywhere, and an order needs its plant in stock.
    pub fn plant_store() -> Self {
        let mut registry = Self::new();
        registry.register_global(NonNegativeInteger::new("quantity"));
        registry.register("orders", StockCheck::plants());
        registry
    }

    pub fn register(&mut self, table: &str, rule: impl RecordRule + 'static) {
        self.by_table
            .entry(table.to_ascii_lowercase())
            .or_default()
            .push(Arc::new(rule));
    }

    pub fn register_global(&mut self, rule: impl RecordRule + 'static) {
        self.global.push(Arc::new(rule));
    }

    /// Global rules first, then the table's own.
    pub fn rules_for<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a dyn RecordRule> + 'a {
        let specific = self
            .by_table
            .get(&table.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.global.iter().chain(specific).map(|rule| rule.as_ref())
    }

    /// Input checks only; never touches the store.
    pub fn normalize(&self, table: &str, record: &mut Record) -> CrudResult<()> {
        for rule in self.rules_for(table) {
            rule.normalize(record)?;
        }
        Ok(())
    }

    pub fn before_insert(&self, conn: &Connection, table: &str, record: &mut Record) -> CrudResult<()> {
        for rule in self.rules_for(table) {
            debug!(table, ?rule, "checking insert");
            rule.before_insert(conn, table, record)?;
        }
        Ok(())
    }

    pub fn before_update(&self, conn: &Connection, table: &str, record: &mut Record) -> CrudResult<()> {
        for rule in self.rules_for(table) {
            debug!(table, ?rule, "checking update");
            rule.before_update(conn, table, record)?;
        }
        Ok(())
    }
}

/// When a record carries `column`, it must hold a whole number >= 0. Text
/// is parsed and replaced by the integer.
#[derive(Debug, Clone)]
pub struct NonNegativeInteger {
    column: String,
}

impl NonNegativeInteger {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }

    fn check(&self, record: &mut Record) -> CrudResult<()> {
        let Some(value) = record.get_mut(&self.column) else {
            return Ok(());
        };
        let parsed = match value {
            Value::Null => return Ok(()),
            Value::Integer(i) => *i,
            Value::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                CrudError::Validation(format!("{} must be a valid number", self.column))
            })?,
            _ => {
                return Err(CrudError::Validation(format!(
                    "{} must be a valid number",
                    self.column
                )))
            }
        };
        if parsed < 0 {
            return Err(CrudError::Validation(format!(
                "{} cannot be a negative number",
                self.column
            )));
        }
        *value = Value::Integer(parsed);
        Ok(())
    }
}

impl RecordRule for NonNegativeInteger {
    fn normalize(&self, record: &mut Record) -> CrudResult<()> {
        self.check(record)
    }
}

/// Rejects a record whose referenced product is missing or has no stock
/// left. Records that do not carry the reference column pass untouched.
#[derive(Debug, Clone)]
pub struct StockCheck {
    pub reference_column: String,
    pub product_table: String,
    pub key_column: String,
    pub quantity_column: String,
}

impl StockCheck {
    pub fn plants() -> Self {
        Self {
            reference_column: "pid".to_string(),
            product_table: "plants".to_string(),
            key_column: "pid".to_string(),
            quantity_column: "quantity".to_string(),
        }
    }

    fn lookup_stock(&self, conn: &Connection, reference: &Value) -> CrudResult<Option<Value>> {
        let table = schema::resolve_table(conn, &self.product_table)?;
        let columns = schema::list_columns(conn, &table)?;
        let key = schema::resolve_column(&table, &columns, &self.key_column)?;
        let quantity = schema::resolve_column(&table, &columns, &self.quantity_column)?;

        let statement = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            quote_identifier(&quantity),
            quote_identifier(&table),
            quote_identifier(&key)
        );
        debug!(%statement, "stock lookup");
        let stock = conn
            .query_row(&statement, [reference], |row| row.get::<_, Value>(0))
            .optional()?;
        Ok(stock)
    }
}

impl RecordRule for StockCheck {
    fn normalize(&self, record: &mut Record) -> CrudResult<()> {
        match record.get(&self.reference_column) {
            Some(reference) if reference.is_null() => Err(CrudError::Validation(format!(
                "{} is required",
                self.reference_column
            ))),
            _ => Ok(()),
        }
    }

    fn before_insert(&self, conn: &Connection, _table: &str, record: &mut Record) -> CrudResult<()> {
        let Some(reference) = record.get(&self.reference_column) else {
            return Ok(());
        };

        let in_stock = match self.lookup_stock(conn, reference)? {
            None => {
                return Err(CrudError::UnknownReference {
                    table: self.product_table.clone(),
                    key: self.key_column.clone(),
                    id: reference.to_string(),
                })
            }
            Some(Value::Real(r)) => r > 0.0,
            Some(stock) => stock.as_i64().unwrap_or(0) > 0,
        };
        if !in_stock {
            return Err(CrudError::OutOfStock {
                table: self.product_table.clone(),
                key: self.key_column.clone(),
                id: reference.to_string(),
            });
        }
        Ok(())
    }
}
