//! Query execution boundary.
//!
//! Every engine takes SQL text and returns a [`ResultFrame`] or an error. The
//! resolver above this layer decides what an error means; engines just report.

pub mod cache;
pub mod databricks_engine;
pub mod sqlite_engine;

use crate::error::Result;
use crate::frame::ResultFrame;
use crate::sql::Dialect;
use async_trait::async_trait;

pub use cache::CachedExecutor;
pub use databricks_engine::DatabricksEngine;
pub use sqlite_engine::SqliteWarehouse;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Engine name for logs (e.g., "databricks", "sqlite").
    fn name(&self) -> &'static str;

    /// SQL dialect the engine expects.
    fn dialect(&self) -> Dialect;

    /// Execute one statement and return its full result.
    async fn execute(&self, sql: &str) -> Result<ResultFrame>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn execute(&self, sql: &str) -> Result<ResultFrame> {
        (**self).execute(sql).await
    }
}
