//! SQL dialect differences between the lakehouse and the local warehouse.
//!
//! Almost all generated SQL is portable (`DATE()`, `COALESCE`, window
//! functions). Only date arithmetic and catalog introspection differ.

use crate::sql::literal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    /// Databricks SQL (Spark).
    Databricks,
    /// SQLite with `silver` / `gold` attached schemas.
    Sqlite,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Databricks => "databricks",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Whole days since 1970-01-01 (or any fixed epoch). Consecutive calendar
    /// days map to consecutive integers, which is all gap-and-island grouping
    /// needs.
    pub fn day_ordinal(&self, expr: &str) -> String {
        match self {
            Dialect::Databricks => format!("DATEDIFF({}, DATE'1970-01-01')", expr),
            Dialect::Sqlite => format!("CAST(julianday({}) AS INTEGER)", expr),
        }
    }

    /// Monday of the ISO week containing `expr`, as a DATE.
    pub fn week_start(&self, expr: &str) -> String {
        match self {
            Dialect::Databricks => format!("DATE(DATE_TRUNC('week', {}))", expr),
            Dialect::Sqlite => format!("DATE({}, 'weekday 0', '-6 days')", expr),
        }
    }

    /// Column-listing statements for `schema.table`, in the order they should
    /// be tried. Each returns a `col_name` column.
    pub fn describe_columns(&self, table: &str) -> Vec<String> {
        match self {
            Dialect::Databricks => vec![
                format!("SHOW COLUMNS IN {}", table),
                format!("DESCRIBE TABLE {}", table),
            ],
            Dialect::Sqlite => {
                let (schema, name) = match table.split_once('.') {
                    Some((schema, name)) => (schema, name),
                    None => ("main", table),
                };
                vec![format!(
                    "SELECT name AS col_name FROM pragma_table_info({}, {})",
                    literal::quote(name),
                    literal::quote(schema)
                )]
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
