//! Catalog probing: sidebar filter options and table column listings.
//!
//! Both degrade to empty results instead of failing; a missing gold table
//! just means the caller falls back to the raw table.

use crate::execution::QueryExecutor;
use crate::filters::coerce_date;
use crate::resolver::QueryResolver;
use crate::views::SILVER_TREND;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Values the filter controls can offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub countries: Vec<String>,
    pub industries: Vec<String>,
}

/// Column names of `table` (`schema.table`), lower-cased.
///
/// Tries each listing statement the dialect offers until one yields names.
/// Blank rows, `#` section headers and the `partition` marker that
/// `DESCRIBE TABLE` emits are dropped.
pub async fn table_columns(executor: &dyn QueryExecutor, table: &str) -> Vec<String> {
    let resolver = QueryResolver::new(executor);
    for statement in executor.dialect().describe_columns(table) {
        let (frame, _) = resolver.run_safe(&format!("columns of {}", table), &statement).await;
        if frame.is_empty() {
            continue;
        }

        let raw = if frame.has_column("col_name") {
            frame.texts("col_name")
        } else {
            frame.columns().to_vec()
        };
        let mut columns: Vec<String> = Vec::new();
        for name in raw {
            let name = name.trim().to_lowercase();
            if name.is_empty() || name.starts_with('#') || name == "partition" {
                continue;
            }
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        if !columns.is_empty() {
            debug!("{} has {} columns", table, columns.len());
            return columns;
        }
    }
    Vec::new()
}

/// Date bounds and distinct countries/industries of the raw table.
pub async fn filter_options(executor: &dyn QueryExecutor) -> FilterOptions {
    let resolver = QueryResolver::new(executor);

    let (meta, _) = resolver
        .run_safe(
            "date range",
            &format!("SELECT MIN(dt) AS min_d, MAX(dt) AS max_d FROM {}", SILVER_TREND),
        )
        .await;
    let (countries, _) = resolver
        .run_safe(
            "countries",
            &format!(
                "SELECT DISTINCT country_code FROM {} WHERE country_code IS NOT NULL ORDER BY country_code",
                SILVER_TREND
            ),
        )
        .await;
    let (industries, _) = resolver
        .run_safe(
            "industries",
            &format!(
                "SELECT DISTINCT industry FROM {} WHERE industry IS NOT NULL ORDER BY industry",
                SILVER_TREND
            ),
        )
        .await;

    FilterOptions {
        min_date: meta.text(0, "min_d").as_deref().and_then(coerce_date),
        max_date: meta.text(0, "max_d").as_deref().and_then(coerce_date),
        countries: countries.texts("country_code"),
        industries: industries.texts("industry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::SqliteWarehouse;

    #[tokio::test]
    async fn test_table_columns_lists_schema_table() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.execute_batch("CREATE TABLE gold.trend_country_summary (dt TEXT, Country_Code TEXT, view_sum INTEGER);")
            .unwrap();
        let cols = table_columns(&wh, "gold.trend_country_summary").await;
        assert_eq!(cols, vec!["dt", "country_code", "view_sum"]);
    }

    #[tokio::test]
    async fn test_missing_table_has_no_columns() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        assert!(table_columns(&wh, "gold.trend_promoted_share").await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_options() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.execute_batch(
            "CREATE TABLE silver.silver_trend (dt TEXT, hashtag TEXT, country_code TEXT, industry TEXT);
             INSERT INTO silver.silver_trend VALUES
               ('2024-02-03 00:00:00', 'a', 'VN', 'Food'),
               ('2024-02-01 00:00:00', 'b', 'US', NULL),
               ('2024-02-02 00:00:00', 'c', NULL, 'Beauty');",
        )
        .unwrap();
        let options = filter_options(&wh).await;
        assert_eq!(options.min_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(options.max_date, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert_eq!(options.countries, vec!["US", "VN"]);
        assert_eq!(options.industries, vec!["Beauty", "Food"]);
    }

    #[tokio::test]
    async fn test_filter_options_without_table() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        assert_eq!(filter_options(&wh).await, FilterOptions::default());
    }
}
