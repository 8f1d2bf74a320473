//! Paid-promotion share per day and country.

use super::{ViewSql, GOLD_PROMOTED_SHARE, SILVER_TREND};
use crate::resolver::QueryPair;
use crate::sql::ColumnBinding;

/// Candidate names for the hashtag count column, in order of preference.
pub const PROMOTED_COUNT_COLUMNS: [&str; 2] = ["hashtag_cnt", "total_cnt"];

impl<'a> ViewSql<'a> {
    /// `gold_columns` is the probed column list of the promoted-share table.
    /// The precomputed query is only built when a count column exists; it is
    /// grouped per country only when the table has `country_code`.
    pub fn promoted_share(&self, gold_columns: &[String]) -> QueryPair {
        let fallback = format!(
            "SELECT
  DATE(dt) AS dt,
  country_code,
  COUNT(*) AS hashtag_cnt,
  SUM(CASE WHEN is_promoted THEN 1 ELSE 0 END) AS promoted_cnt,
  SUM(CASE WHEN is_promoted THEN 1 ELSE 0 END) * 1.0 / NULLIF(COUNT(*), 0) AS promoted_share
FROM {silver}
{filter}
GROUP BY DATE(dt), country_code
ORDER BY dt, country_code",
            silver = SILVER_TREND,
            filter = self.filter(
                ColumnBinding::none()
                    .date("dt")
                    .country("country_code")
                    .hashtag("COALESCE(hashtag_raw, hashtag)")
            ),
        );

        let has = |name: &str| gold_columns.iter().any(|c| c == name);
        let Some(count_column) = PROMOTED_COUNT_COLUMNS.into_iter().find(|c| has(*c)) else {
            return QueryPair::fallback_only(fallback);
        };

        // No hashtag column in the precomputed table, so no keyword filter.
        let primary = if has("country_code") {
            format!(
                "SELECT dt, country_code, {count} AS hashtag_cnt, promoted_cnt, promoted_share
FROM {gold}
{filter}
ORDER BY dt, country_code",
                count = count_column,
                gold = GOLD_PROMOTED_SHARE,
                filter = self.filter(ColumnBinding::none().date("dt").country("country_code")),
            )
        } else {
            format!(
                "SELECT dt, {count} AS hashtag_cnt, promoted_cnt, promoted_share
FROM {gold}
{filter}
ORDER BY dt",
                count = count_column,
                gold = GOLD_PROMOTED_SHARE,
                filter = self.filter(ColumnBinding::none().date("dt")),
            )
        };

        QueryPair::new(primary, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterState, RawFilters};
    use crate::sql::Dialect;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn vietnam() -> FilterState {
        FilterState::from_input(RawFilters {
            countries: vec!["VN".to_string()],
            keyword: "sale".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_promoted_share_without_count_column_is_fallback_only() {
        let f = vietnam();
        let pair = ViewSql::new(&f, Dialect::Databricks).promoted_share(&columns(&["dt", "promoted_cnt"]));
        assert!(pair.primary.is_none());
        assert!(pair.fallback.contains("country_code IN ('VN')"));
        assert!(pair.fallback.contains("LIKE '%sale%'"));
    }

    #[test]
    fn test_promoted_share_country_grain() {
        let f = vietnam();
        let view = ViewSql::new(&f, Dialect::Databricks);

        let with_country = view
            .promoted_share(&columns(&["dt", "country_code", "total_cnt", "promoted_cnt", "promoted_share"]))
            .primary
            .unwrap();
        assert!(with_country.contains("total_cnt AS hashtag_cnt"));
        assert!(with_country.contains("WHERE country_code IN ('VN')"));
        assert!(!with_country.contains("LIKE"));

        let global = view
            .promoted_share(&columns(&["dt", "hashtag_cnt", "promoted_cnt", "promoted_share"]))
            .primary
            .unwrap();
        assert!(!global.contains("country_code"));
        assert!(global.ends_with("ORDER BY dt"));
    }
}
