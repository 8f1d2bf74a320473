pub mod analytics;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod execution;
pub mod filters;
pub mod frame;
pub mod llm;
pub mod prompt;
pub mod resolver;
pub mod sql;
pub mod views;

pub use config::AppConfig;
pub use dashboard::{Dashboard, Snapshot};
pub use error::{Result, TrendError};
pub use execution::{CachedExecutor, DatabricksEngine, QueryExecutor, SqliteWarehouse};
pub use filters::{FilterState, RawFilters, TopN};
pub use frame::ResultFrame;
pub use resolver::{QueryPair, QueryResolver, Resolution, ResolvedFrom};
pub use views::ViewKind;
