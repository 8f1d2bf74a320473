//! Local SQLite warehouse.
//!
//! Mirrors the lakehouse layout with two attached schemas, `silver` and
//! `gold`, so the same `silver.silver_trend` / `gold.trend_*` names resolve.
//! SQLite has had window functions since 3.25, which covers every fallback
//! query. Used for offline runs and in tests.

use crate::error::{Result, TrendError};
use crate::execution::QueryExecutor;
use crate::frame::{Cell, ResultFrame};
use crate::sql::Dialect;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    /// Empty in-memory warehouse with `silver` and `gold` attached.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "ATTACH DATABASE ':memory:' AS silver;
             ATTACH DATABASE ':memory:' AS gold;",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Warehouse backed by `<dir>/silver.db` and `<dir>/gold.db`.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        for schema in ["silver", "gold"] {
            let file = dir.join(format!("{}.db", schema));
            let file = file.to_str().ok_or_else(|| {
                TrendError::Config(format!("Non UTF-8 warehouse path: {}", file.display()))
            })?;
            conn.execute(&format!("ATTACH DATABASE ?1 AS {}", schema), [file])?;
        }
        info!("Opened SQLite warehouse at {}", dir.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run DDL / seed statements.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrendError::Execution("SQLite connection lock poisoned".to_string()))
    }

    fn query(&self, sql: &str) -> Result<ResultFrame> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(to_cell(row.get_ref(i)?));
            }
            data.push(cells);
        }
        ResultFrame::new(columns, data)
    }
}

#[async_trait]
impl QueryExecutor for SqliteWarehouse {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str) -> Result<ResultFrame> {
        debug!("sqlite: {}", sql.trim());
        self.query(sql)
    }
}

fn to_cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_attached_schemas_resolve() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.execute_batch(
            "CREATE TABLE silver.silver_trend (dt TEXT, hashtag TEXT, view_count INTEGER);
             INSERT INTO silver.silver_trend VALUES ('2024-01-01', 'food', 10);",
        )
        .unwrap();

        let frame = wh.execute("SELECT * FROM silver.silver_trend").await.unwrap();
        assert_eq!(frame.columns(), &["dt", "hashtag", "view_count"]);
        assert_eq!(frame.rows()[0], vec![json!("2024-01-01"), json!("food"), json!(10)]);
    }

    #[tokio::test]
    async fn test_duplicate_column_names_are_preserved() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let frame = wh.execute("SELECT 1 AS a, 2 AS a, NULL AS b").await.unwrap();
        assert_eq!(frame.columns(), &["a", "a", "b"]);
        assert_eq!(frame.rows()[0][2], Value::Null);
    }

    #[tokio::test]
    async fn test_bad_sql_is_an_error() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        assert!(wh.execute("SELECT * FROM gold.missing_table").await.is_err());
    }
}
