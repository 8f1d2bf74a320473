//! Trend views: momentum, retention streaks, new entries, weekly summary.

use super::{ViewSql, GOLD_MOMENTUM, GOLD_RETENTION, GOLD_WEEKLY_SUMMARY, SILVER_TREND};
use crate::resolver::QueryPair;
use crate::sql::ColumnBinding;

impl<'a> ViewSql<'a> {
    /// Day-over-day rank and view movement per hashtag.
    ///
    /// The recompute keeps one row per (day, hashtag), the best-ranked one,
    /// then takes LAG deltas along each hashtag's timeline.
    pub fn momentum(&self) -> QueryPair {
        let primary = format!(
            "WITH b AS (
  SELECT DISTINCT DATE(dt) AS dt, hashtag, country_code, industry, hashtag_raw
  FROM {silver}
),
m AS (
  SELECT dt, hashtag, rank, prev_rank, rank_velocity, view_delta, video_delta
  FROM {gold}
),
j AS (
  SELECT m.*, b.country_code, b.industry, b.hashtag_raw
  FROM m LEFT JOIN b ON DATE(m.dt) = b.dt AND m.hashtag = b.hashtag
)
SELECT * FROM j
{filter}
ORDER BY j.dt, j.hashtag",
            silver = SILVER_TREND,
            gold = GOLD_MOMENTUM,
            filter = self.filter(
                ColumnBinding::none()
                    .date("j.dt")
                    .country("j.country_code")
                    .industry("j.industry")
                    .hashtag("COALESCE(j.hashtag_raw, j.hashtag)")
            ),
        );

        let fallback = format!(
            "WITH s AS (
  SELECT DATE(dt) AS dt, hashtag, rank, view_count, video_count, country_code, industry, hashtag_raw
  FROM {silver}
),
best AS (
  SELECT * FROM (
    SELECT s.*, ROW_NUMBER() OVER (PARTITION BY dt, hashtag ORDER BY COALESCE(rank, 999), view_count DESC) AS rn
    FROM s
  ) ranked WHERE rn = 1
),
x AS (
  SELECT
    dt, hashtag, rank,
    LAG(rank) OVER (PARTITION BY hashtag ORDER BY dt) AS prev_rank,
    (LAG(rank) OVER (PARTITION BY hashtag ORDER BY dt) - rank) AS rank_velocity,
    (view_count - LAG(view_count) OVER (PARTITION BY hashtag ORDER BY dt)) AS view_delta,
    (video_count - LAG(video_count) OVER (PARTITION BY hashtag ORDER BY dt)) AS video_delta,
    country_code, industry, hashtag_raw
  FROM best
)
SELECT * FROM x
{filter}
ORDER BY dt, hashtag",
            silver = SILVER_TREND,
            filter = self.filter(
                ColumnBinding::none()
                    .date("dt")
                    .country("country_code")
                    .industry("industry")
                    .hashtag("COALESCE(hashtag_raw, hashtag)")
            ),
        );

        QueryPair::new(primary, fallback)
    }

    /// Consecutive-day streaks per hashtag, filtered on the streak end day.
    ///
    /// Gap-and-island: within a hashtag, `day_ordinal(dt) - ROW_NUMBER()` is
    /// constant across a run of consecutive days and changes after a gap.
    pub fn retention(&self) -> QueryPair {
        let primary = format!(
            "WITH base AS (
  SELECT DISTINCT DATE(dt) AS dt, hashtag, url, country_code, industry, hashtag_raw
  FROM {silver}
),
j AS (
  SELECT r.hashtag, r.start_dt, r.end_dt, r.streak_days,
         b.url, b.country_code, b.industry, b.hashtag_raw
  FROM {gold} r
  LEFT JOIN base b ON r.hashtag = b.hashtag AND r.end_dt = b.dt
)
SELECT * FROM j
{filter}",
            silver = SILVER_TREND,
            gold = GOLD_RETENTION,
            filter = self.filter(
                ColumnBinding::none()
                    .date("j.end_dt")
                    .country("j.country_code")
                    .industry("j.industry")
                    .hashtag("COALESCE(j.hashtag_raw, j.hashtag)")
            ),
        );

        let fallback = format!(
            "WITH s AS (
  SELECT DISTINCT DATE(dt) AS dt, hashtag FROM {silver}
),
g AS (
  SELECT hashtag, dt,
    {ordinal} - ROW_NUMBER() OVER (PARTITION BY hashtag ORDER BY dt) AS grp
  FROM s
),
streaks AS (
  SELECT hashtag, MIN(dt) AS start_dt, MAX(dt) AS end_dt, COUNT(*) AS streak_days
  FROM g GROUP BY hashtag, grp
),
dim AS (
  SELECT DISTINCT DATE(dt) AS dt, hashtag, url, country_code, industry, hashtag_raw
  FROM {silver}
)
SELECT r.hashtag, r.start_dt, r.end_dt, r.streak_days,
       d.url, d.country_code, d.industry, d.hashtag_raw
FROM streaks r
LEFT JOIN dim d ON r.hashtag = d.hashtag AND r.end_dt = d.dt
{filter}",
            silver = SILVER_TREND,
            ordinal = self.dialect().day_ordinal("dt"),
            filter = self.filter(
                ColumnBinding::none()
                    .date("r.end_dt")
                    .country("d.country_code")
                    .industry("d.industry")
                    .hashtag("COALESCE(d.hashtag_raw, r.hashtag)")
            ),
        );

        QueryPair::new(primary, fallback)
    }

    /// Hashtags first seen on each day. Country and industry do not apply.
    pub fn new_entries(&self) -> String {
        format!(
            "WITH base AS (SELECT DISTINCT DATE(dt) AS dt, hashtag FROM {silver}),
firsts AS (SELECT hashtag, MIN(dt) AS dt FROM base GROUP BY hashtag)
SELECT dt, COUNT(*) AS new_count
FROM firsts
{filter}
GROUP BY dt
ORDER BY dt",
            silver = SILVER_TREND,
            filter = self.filter(ColumnBinding::none().date("dt").hashtag("hashtag")),
        )
    }

    /// Per-week rank summary. The date filter is widened to whole weeks.
    pub fn weekly(&self) -> QueryPair {
        let binding = ColumnBinding::none()
            .week("w.week")
            .country("b.country_code")
            .industry("b.industry")
            .hashtag("COALESCE(b.hashtag_raw, w.hashtag)");

        let primary = format!(
            "WITH b AS (
  SELECT DISTINCT DATE(dt) AS dt, hashtag, country_code, industry, hashtag_raw
  FROM {silver}
)
SELECT w.week, w.hashtag, w.best_rank, w.avg_rank, w.new_days_count, w.max_views,
       b.country_code, b.industry, b.hashtag_raw
FROM {gold} w
LEFT JOIN b ON w.hashtag = b.hashtag
{filter}
ORDER BY w.week DESC, COALESCE(w.best_rank, 999) ASC",
            silver = SILVER_TREND,
            gold = GOLD_WEEKLY_SUMMARY,
            filter = self.filter(binding.clone()),
        );

        let fallback = format!(
            "WITH base AS (
  SELECT DATE(dt) AS dt, hashtag, COALESCE(rank, 999) AS rank, view_count
  FROM {silver}
),
best AS (
  SELECT * FROM (
    SELECT base.*, ROW_NUMBER() OVER (PARTITION BY dt, hashtag ORDER BY rank, view_count DESC) AS rn
    FROM base
  ) ranked WHERE rn = 1
),
w AS (
  SELECT {week} AS week, hashtag,
         MIN(rank) AS best_rank, AVG(rank) AS avg_rank,
         COUNT(*) AS new_days_count, MAX(view_count) AS max_views
  FROM best GROUP BY 1, 2
),
b AS (
  SELECT DISTINCT DATE(dt) AS dt, hashtag, country_code, industry, hashtag_raw
  FROM {silver}
)
SELECT w.week, w.hashtag, w.best_rank, w.avg_rank, w.new_days_count, w.max_views,
       b.country_code, b.industry, b.hashtag_raw
FROM w LEFT JOIN b ON w.hashtag = b.hashtag
{filter}
ORDER BY w.week DESC, COALESCE(w.best_rank, 999) ASC",
            silver = SILVER_TREND,
            week = self.dialect().week_start("dt"),
            filter = self.filter(binding),
        );

        QueryPair::new(primary, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterState, RawFilters};
    use crate::sql::Dialect;

    fn filters() -> FilterState {
        FilterState::from_input(RawFilters {
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            countries: vec!["VN".to_string()],
            industries: vec!["ALL".to_string()],
            keyword: "Food".to_string(),
            top_n: None,
        })
    }

    #[test]
    fn test_momentum_binds_joined_columns() {
        let f = filters();
        let pair = ViewSql::new(&f, Dialect::Databricks).momentum();
        let primary = pair.primary.unwrap();
        assert!(primary.contains("FROM gold.trend_momentum"));
        assert!(primary.contains(
            "WHERE DATE(j.dt) BETWEEN DATE('2024-01-01') AND DATE('2024-01-31') AND j.country_code IN ('VN') AND LOWER(COALESCE(j.hashtag_raw, j.hashtag)) LIKE '%food%'"
        ));
        assert!(pair.fallback.contains("ORDER BY COALESCE(rank, 999), view_count DESC"));
        assert!(pair.fallback.contains("WHERE DATE(dt) BETWEEN"));
    }

    #[test]
    fn test_retention_fallback_uses_dialect_ordinal() {
        let f = FilterState::default();
        let sqlite = ViewSql::new(&f, Dialect::Sqlite).retention();
        assert!(sqlite.fallback.contains("CAST(julianday(dt) AS INTEGER) - ROW_NUMBER()"));
        let spark = ViewSql::new(&f, Dialect::Databricks).retention();
        assert!(spark.fallback.contains("DATEDIFF(dt, DATE'1970-01-01') - ROW_NUMBER()"));
        assert!(!spark.fallback.contains("WHERE"));
    }

    #[test]
    fn test_new_entries_ignores_country() {
        let f = filters();
        let sql = ViewSql::new(&f, Dialect::Sqlite).new_entries();
        assert!(!sql.contains("country_code IN"));
        assert!(sql.contains("LOWER(hashtag) LIKE '%food%'"));
    }

    #[test]
    fn test_weekly_truncates_both_bounds() {
        let f = filters();
        let pair = ViewSql::new(&f, Dialect::Databricks).weekly();
        let primary = pair.primary.unwrap();
        assert!(primary.contains(
            "DATE(w.week) BETWEEN DATE(DATE_TRUNC('week', DATE('2024-01-01'))) AND DATE(DATE_TRUNC('week', DATE('2024-01-31')))"
        ));
        assert!(pair.fallback.contains("DATE(DATE_TRUNC('week', dt)) AS week"));
    }
}
