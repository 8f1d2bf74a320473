//! Market views: KPI header, opportunity, proven top 100, industry mix and
//! country totals.

use super::{ViewSql, GOLD_COUNTRY_SUMMARY, GOLD_LATEST_TOP100, SILVER_TREND};
use crate::resolver::QueryPair;
use crate::sql::{literal, ColumnBinding};
use chrono::NaiveDate;

/// Candidate names for the views column of the country summary table, in
/// order of preference.
pub const COUNTRY_VIEW_COLUMNS: [&str; 3] = ["total_views", "views", "view_sum"];

const INDUSTRY_SHARE_LIMIT: usize = 12;
const INDUSTRY_EFFICIENCY_LIMIT: usize = 15;

impl<'a> ViewSql<'a> {
    /// Distinct hashtag, country and industry counts in scope, plus the
    /// number of hashtags seen on the latest day.
    pub fn kpi(&self) -> String {
        format!(
            "SELECT
  COUNT(DISTINCT hashtag) AS uniq_hashtags,
  COUNT(DISTINCT CASE WHEN DATE(dt) = (SELECT MAX(DATE(dt)) FROM {silver}) THEN hashtag END) AS today_tags,
  COUNT(DISTINCT country_code) AS uniq_countries,
  COUNT(DISTINCT industry) AS uniq_industries
FROM {silver}
{filter}",
            silver = SILVER_TREND,
            filter = self.filter(
                ColumnBinding::none()
                    .date("dt")
                    .country("country_code")
                    .industry("industry")
                    .hashtag("COALESCE(hashtag_raw, hashtag)")
            ),
        )
    }

    /// Latest-day hashtags with demand (views) against competition (videos).
    pub fn opportunity(&self) -> QueryPair {
        let primary = format!(
            "WITH mx AS (SELECT MAX(dt) AS mx FROM {silver})
SELECT t.hashtag, t.view_count, t.video_count, t.industry, t.country_code, t.rank
FROM {gold} t
JOIN mx ON t.dt = mx.mx
{filter}",
            silver = SILVER_TREND,
            gold = GOLD_LATEST_TOP100,
            filter = self.filter(
                ColumnBinding::none()
                    .date("t.dt")
                    .country("t.country_code")
                    .industry("t.industry")
                    .hashtag("COALESCE(t.hashtag_raw, t.hashtag)")
            ),
        );

        // Already pinned to the latest day, so no date binding.
        let fallback = format!(
            "WITH mx AS (SELECT MAX(DATE(dt)) AS mx FROM {silver}),
s AS (
  SELECT *, ROW_NUMBER() OVER (PARTITION BY hashtag ORDER BY view_count DESC) AS rn
  FROM {silver}
  WHERE DATE(dt) = (SELECT mx FROM mx)
)
SELECT hashtag, view_count, video_count, industry, country_code, rank
FROM s
{filter}",
            silver = SILVER_TREND,
            filter = self.filter_with(
                ColumnBinding::none()
                    .country("country_code")
                    .industry("industry")
                    .hashtag("COALESCE(hashtag_raw, hashtag)"),
                vec!["rn = 1".to_string()],
            ),
        );

        QueryPair::new(primary, fallback)
    }

    /// Best-ranked 100 hashtags of the latest day.
    pub fn top100(&self) -> QueryPair {
        let primary = format!(
            "WITH mx AS (SELECT MAX(dt) AS mx FROM {silver})
SELECT
  t.dt, t.hashtag, t.rank, t.view_count, t.video_count,
  t.country_code, t.industry, t.category,
  t.hashtag_raw, t.url
FROM {gold} t
JOIN mx ON t.dt = mx.mx
{filter}
ORDER BY COALESCE(t.rank, 999) ASC
LIMIT 100",
            silver = SILVER_TREND,
            gold = GOLD_LATEST_TOP100,
            filter = self.filter(
                ColumnBinding::none()
                    .date("t.dt")
                    .country("t.country_code")
                    .industry("t.industry")
                    .hashtag("COALESCE(t.hashtag_raw, t.hashtag)")
            ),
        );

        let fallback = format!(
            "WITH mx AS (SELECT MAX(DATE(dt)) AS mx FROM {silver}),
s AS (
  SELECT *, ROW_NUMBER() OVER (PARTITION BY hashtag ORDER BY COALESCE(rank, 999), view_count DESC) AS rn
  FROM {silver}
  WHERE DATE(dt) = (SELECT mx FROM mx)
)
SELECT DATE(dt) AS dt, hashtag, rank, view_count, video_count,
       country_code, industry, hashtag_raw, url
FROM s
{filter}
ORDER BY COALESCE(rank, 999) ASC, view_count DESC
LIMIT 100",
            silver = SILVER_TREND,
            filter = self.filter_with(
                ColumnBinding::none()
                    .country("country_code")
                    .industry("industry")
                    .hashtag("COALESCE(hashtag_raw, hashtag)"),
                vec!["rn = 1".to_string()],
            ),
        );

        QueryPair::new(primary, fallback)
    }

    /// Most recent day present in the raw table, as column `mx`.
    pub fn latest_day(&self) -> String {
        format!("SELECT MAX(DATE(dt)) AS mx FROM {}", SILVER_TREND)
    }

    /// Views per industry on one day.
    pub fn industry_share(&self, day: NaiveDate) -> String {
        format!(
            "SELECT industry, SUM(view_count) AS total_views
FROM {silver}
{filter}
GROUP BY industry
ORDER BY total_views DESC
LIMIT {limit}",
            silver = SILVER_TREND,
            filter = self.filter_with(
                ColumnBinding::none()
                    .country("country_code")
                    .hashtag("COALESCE(hashtag_raw, hashtag)"),
                vec![
                    format!("DATE(dt) = {}", literal::date(day)),
                    "industry IS NOT NULL".to_string(),
                ],
            ),
            limit = INDUSTRY_SHARE_LIMIT,
        )
    }

    /// Views per video per industry on one day.
    pub fn industry_efficiency(&self, day: NaiveDate) -> String {
        format!(
            "SELECT
  industry,
  SUM(view_count) AS total_views,
  SUM(video_count) AS total_videos,
  SUM(view_count) * 1.0 / NULLIF(SUM(video_count), 0) AS view_per_video
FROM {silver}
{filter}
GROUP BY industry
ORDER BY view_per_video DESC
LIMIT {limit}",
            silver = SILVER_TREND,
            filter = self.filter_with(
                ColumnBinding::none()
                    .country("country_code")
                    .hashtag("COALESCE(hashtag_raw, hashtag)"),
                vec![
                    format!("DATE(dt) = {}", literal::date(day)),
                    "industry IS NOT NULL".to_string(),
                    "video_count > 0".to_string(),
                ],
            ),
            limit = INDUSTRY_EFFICIENCY_LIMIT,
        )
    }

    /// Total views per day and country.
    ///
    /// `gold_columns` is the probed column list of the country summary table.
    /// Without a usable views column only the recompute runs. The summary
    /// table has no hashtag, so the keyword filter applies to the recompute
    /// alone.
    pub fn country_views(&self, gold_columns: &[String]) -> QueryPair {
        let fallback = format!(
            "SELECT DATE(dt) AS dt, country_code, SUM(view_count) AS total_views
FROM {silver}
{filter}
GROUP BY 1, 2
ORDER BY 1, 2",
            silver = SILVER_TREND,
            filter = self.filter(
                ColumnBinding::none()
                    .date("dt")
                    .country("country_code")
                    .hashtag("COALESCE(hashtag_raw, hashtag)")
            ),
        );

        let views_column = COUNTRY_VIEW_COLUMNS
            .iter()
            .find(|c| gold_columns.iter().any(|g| g == *c));
        let Some(views_column) = views_column else {
            return QueryPair::fallback_only(fallback);
        };

        let primary = format!(
            "SELECT dt, country_code, {column} AS total_views
FROM {gold}
{filter}
ORDER BY dt, country_code",
            column = views_column,
            gold = GOLD_COUNTRY_SUMMARY,
            filter = self.filter(ColumnBinding::none().date("dt").country("country_code")),
        );

        QueryPair::new(primary, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterState, RawFilters};
    use crate::sql::Dialect;

    fn keyword_only(keyword: &str) -> FilterState {
        FilterState::from_input(RawFilters {
            keyword: keyword.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_opportunity_fallback_keeps_single_where() {
        let f = keyword_only("ai");
        let pair = ViewSql::new(&f, Dialect::Sqlite).opportunity();
        assert_eq!(pair.fallback.matches("WHERE rn = 1").count(), 1);
        assert!(pair
            .fallback
            .contains("WHERE rn = 1 AND LOWER(COALESCE(hashtag_raw, hashtag)) LIKE '%ai%'"));
        assert!(!pair.fallback.contains("BETWEEN"));
    }

    #[test]
    fn test_industry_views_pin_the_day_first() {
        let f = keyword_only("");
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let view = ViewSql::new(&f, Dialect::Databricks);
        let share = view.industry_share(day);
        assert!(share.contains("WHERE DATE(dt) = DATE('2024-03-09') AND industry IS NOT NULL\n"));
        assert!(share.ends_with("LIMIT 12"));
        let eff = view.industry_efficiency(day);
        assert!(eff.contains("AND video_count > 0"));
        assert!(eff.ends_with("LIMIT 15"));
    }

    #[test]
    fn test_country_views_probes_views_column() {
        let f = keyword_only("ai");
        let view = ViewSql::new(&f, Dialect::Databricks);

        let missing = view.country_views(&["dt".to_string(), "country_code".to_string()]);
        assert!(missing.primary.is_none());

        let cols = vec!["dt".to_string(), "view_sum".to_string(), "views".to_string()];
        let pair = view.country_views(&cols);
        let primary = pair.primary.unwrap();
        assert!(primary.contains("views AS total_views"));
        assert!(!primary.contains("LIKE"));
        assert!(pair.fallback.contains("LIKE '%ai%'"));
    }

    #[test]
    fn test_kpi_without_filters_has_no_where() {
        let f = FilterState::default();
        let sql = ViewSql::new(&f, Dialect::Sqlite).kpi();
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("AS today_tags"));
    }
}
