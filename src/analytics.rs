//! Frame analytics on top of polars.
//!
//! Frames reach this module already normalized, so column names are unique
//! and can become polars series names directly.

use crate::error::Result;
use crate::filters::coerce_date;
use crate::frame::{cell_number, cell_text, ResultFrame};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

const PERSISTENCE_TOP: usize = 10;
const ORGANIC_BELOW: f64 = 0.02;
const BALANCED_BELOW: f64 = 0.10;
/// Last-7-days share within this distance of the global share counts as stable.
const STABLE_DELTA: f64 = 0.005;

/// Convert a frame to a polars `DataFrame`.
///
/// A column whose non-null cells all parse as numbers becomes `Float64`;
/// anything else becomes `String`.
pub fn to_dataframe(frame: &ResultFrame) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(frame.columns().len());
    for (idx, name) in frame.columns().iter().enumerate() {
        let cells: Vec<_> = frame.rows().iter().map(|row| &row[idx]).collect();
        let numeric = cells.iter().any(|c| !c.is_null())
            && cells.iter().all(|c| c.is_null() || cell_number(c).is_some());

        let series = if numeric {
            let values: Vec<Option<f64>> = cells.iter().map(|c| cell_number(c)).collect();
            Series::new(name.as_str(), values)
        } else {
            let values: Vec<Option<String>> = cells.iter().map(|c| cell_text(c)).collect();
            Series::new(name.as_str(), values)
        };
        columns.push(series);
    }
    Ok(DataFrame::new(columns)?)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryPersistence {
    pub industry: String,
    pub avg_streak_days: f64,
}

/// Mean streak length per industry, longest first, top 10.
pub fn industry_persistence(retention: &ResultFrame) -> Result<Vec<IndustryPersistence>> {
    if retention.is_empty() || !retention.has_column("industry") || !retention.has_column("streak_days") {
        return Ok(Vec::new());
    }

    let grouped = to_dataframe(&retention.select(&["industry", "streak_days"]))?
        .lazy()
        .with_columns([
            col("industry").cast(DataType::String),
            col("streak_days").cast(DataType::Float64),
        ])
        .filter(col("industry").is_not_null())
        .group_by([col("industry")])
        .agg([col("streak_days").mean().alias("avg_streak_days")])
        .collect()?;

    let industries = grouped.column("industry")?.str()?;
    let averages = grouped.column("avg_streak_days")?.f64()?;
    let mut out: Vec<IndustryPersistence> = industries
        .into_iter()
        .zip(averages.into_iter())
        .filter_map(|(industry, avg)| {
            Some(IndustryPersistence {
                industry: industry?.to_string(),
                avg_streak_days: avg?,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.avg_streak_days
            .partial_cmp(&a.avg_streak_days)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.industry.cmp(&b.industry))
    });
    out.truncate(PERSISTENCE_TOP);
    Ok(out)
}

/// How much of the market runs on paid promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PaidLevel {
    #[default]
    Unknown,
    Organic,
    Balanced,
    AdsHeavy,
}

impl PaidLevel {
    pub fn classify(share: Option<f64>) -> Self {
        match share {
            None => PaidLevel::Unknown,
            Some(x) if x < ORGANIC_BELOW => PaidLevel::Organic,
            Some(x) if x < BALANCED_BELOW => PaidLevel::Balanced,
            Some(_) => PaidLevel::AdsHeavy,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaidLevel::Unknown => "unknown",
            PaidLevel::Organic => "mostly organic",
            PaidLevel::Balanced => "balanced",
            PaidLevel::AdsHeavy => "ads-heavy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShareTrend {
    Stable,
    Rising,
    Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryShare {
    pub country_code: String,
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromotedSummary {
    pub global_share: Option<f64>,
    pub last7_share: Option<f64>,
    pub latest_day: Option<NaiveDate>,
    /// Classified on the last-7-days share when present, else the global one.
    pub level: PaidLevel,
    pub trend: Option<ShareTrend>,
    pub top_country: Option<CountryShare>,
}

impl PromotedSummary {
    /// No promoted hashtags anywhere in scope.
    pub fn is_organic_baseline(&self) -> bool {
        match self.global_share {
            None => true,
            Some(g) => g == 0.0 && self.last7_share.map_or(true, |s| s == 0.0),
        }
    }
}

/// Global and trailing-week promoted share of a promoted-share frame
/// (`dt`, optional `country_code`, `hashtag_cnt`, `promoted_cnt`).
pub fn promoted_summary(frame: &ResultFrame) -> Result<PromotedSummary> {
    if frame.is_empty() || !frame.has_column("hashtag_cnt") || !frame.has_column("promoted_cnt") {
        return Ok(PromotedSummary::default());
    }

    let counts = to_dataframe(&frame.select(&["hashtag_cnt", "promoted_cnt"]))?;
    let global_share = share(counts.clone().lazy())?;

    let days: Vec<Option<NaiveDate>> = (0..frame.row_count())
        .map(|i| frame.text(i, "dt").as_deref().and_then(coerce_date))
        .collect();
    let latest_day = days.iter().flatten().max().copied();

    let last7_share = match latest_day {
        Some(latest) => {
            let start = latest - Duration::days(6);
            let mask: Vec<bool> = days
                .iter()
                .map(|d| matches!(d, Some(d) if *d >= start && *d <= latest))
                .collect();
            let mask = BooleanChunked::from_slice("last7", &mask);
            share(counts.filter(&mask)?.lazy())?
        }
        None => None,
    };

    let trend = match (global_share, last7_share) {
        (Some(global), Some(recent)) => {
            let diff = recent - global;
            Some(if diff.abs() < STABLE_DELTA {
                ShareTrend::Stable
            } else if diff > 0.0 {
                ShareTrend::Rising
            } else {
                ShareTrend::Falling
            })
        }
        _ => None,
    };

    Ok(PromotedSummary {
        global_share,
        last7_share,
        latest_day,
        level: PaidLevel::classify(last7_share.or(global_share)),
        trend,
        top_country: top_promoted_country(frame)?,
    })
}

fn share(counts: LazyFrame) -> Result<Option<f64>> {
    let totals = counts
        .select([
            col("hashtag_cnt").cast(DataType::Float64).sum(),
            col("promoted_cnt").cast(DataType::Float64).sum(),
        ])
        .collect()?;
    let total = totals.column("hashtag_cnt")?.f64()?.get(0).unwrap_or(0.0);
    let promoted = totals.column("promoted_cnt")?.f64()?.get(0).unwrap_or(0.0);
    Ok(if total > 0.0 { Some(promoted / total) } else { None })
}

fn top_promoted_country(frame: &ResultFrame) -> Result<Option<CountryShare>> {
    if !frame.has_column("country_code") {
        return Ok(None);
    }

    let by_country = to_dataframe(&frame.select(&["country_code", "hashtag_cnt", "promoted_cnt"]))?
        .lazy()
        .with_columns([col("country_code").cast(DataType::String)])
        .filter(col("country_code").is_not_null())
        .group_by([col("country_code")])
        .agg([
            col("hashtag_cnt").cast(DataType::Float64).sum().alias("total_hashtag"),
            col("promoted_cnt").cast(DataType::Float64).sum().alias("total_promoted"),
        ])
        .collect()?;

    let countries = by_country.column("country_code")?.str()?;
    let totals = by_country.column("total_hashtag")?.f64()?;
    let promoted = by_country.column("total_promoted")?.f64()?;

    let mut best: Option<CountryShare> = None;
    for ((country, total), prom) in countries.into_iter().zip(totals.into_iter()).zip(promoted.into_iter()) {
        let (Some(country), Some(total), Some(prom)) = (country, total, prom) else {
            continue;
        };
        if total <= 0.0 {
            continue;
        }
        let share = prom / total;
        let better = match &best {
            None => true,
            Some(b) => share > b.share || (share == b.share && country < b.country_code.as_str()),
        };
        if better {
            best = Some(CountryShare {
                country_code: country.to_string(),
                share,
            });
        }
    }
    Ok(best)
}

/// Momentum with `view_delta` and `rank_velocity` forced numeric (0 when
/// missing or unparseable).
pub fn prepare_momentum(frame: ResultFrame) -> ResultFrame {
    frame
        .coerce_numeric("view_delta", 0.0)
        .coerce_numeric("rank_velocity", 0.0)
}

/// Rows whose `date_column` equals the column's maximum.
pub fn latest_slice(frame: &ResultFrame, date_column: &str) -> ResultFrame {
    let Some(latest) = frame.texts(date_column).into_iter().max() else {
        return ResultFrame::empty();
    };
    frame.filter(|i| frame.text(i, date_column).as_deref() == Some(latest.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn frame(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultFrame {
        ResultFrame::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_to_dataframe_types() {
        let f = frame(
            &["hashtag", "views", "empty"],
            vec![
                vec![json!("a"), json!("10"), Value::Null],
                vec![json!("b"), json!(2.5), Value::Null],
            ],
        );
        let df = to_dataframe(&f).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("views").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("hashtag").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("empty").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_industry_persistence_ranks_by_mean_streak() {
        let f = frame(
            &["hashtag", "industry", "streak_days"],
            vec![
                vec![json!("a"), json!("Food"), json!(2)],
                vec![json!("b"), json!("Food"), json!(4)],
                vec![json!("c"), json!("Beauty"), json!(5)],
                vec![json!("d"), Value::Null, json!(9)],
            ],
        );
        let out = industry_persistence(&f).unwrap();
        assert_eq!(
            out,
            vec![
                IndustryPersistence {
                    industry: "Beauty".to_string(),
                    avg_streak_days: 5.0
                },
                IndustryPersistence {
                    industry: "Food".to_string(),
                    avg_streak_days: 3.0
                },
            ]
        );
        assert!(industry_persistence(&ResultFrame::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_paid_level_thresholds() {
        assert_eq!(PaidLevel::classify(None), PaidLevel::Unknown);
        assert_eq!(PaidLevel::classify(Some(0.0)), PaidLevel::Organic);
        assert_eq!(PaidLevel::classify(Some(0.02)), PaidLevel::Balanced);
        assert_eq!(PaidLevel::classify(Some(0.099)), PaidLevel::Balanced);
        assert_eq!(PaidLevel::classify(Some(0.10)), PaidLevel::AdsHeavy);
    }

    #[test]
    fn test_promoted_summary_last_seven_days() {
        let f = frame(
            &["dt", "country_code", "hashtag_cnt", "promoted_cnt"],
            vec![
                vec![json!("2024-01-01"), json!("VN"), json!(100), json!(0)],
                vec![json!("2024-01-10"), json!("VN"), json!(50), json!(5)],
                vec![json!("2024-01-12"), json!("US"), json!(50), json!(5)],
            ],
        );
        let summary = promoted_summary(&f).unwrap();
        assert_eq!(summary.latest_day, NaiveDate::from_ymd_opt(2024, 1, 12));
        assert_eq!(summary.global_share, Some(0.05));
        assert_eq!(summary.last7_share, Some(0.1));
        assert_eq!(summary.level, PaidLevel::AdsHeavy);
        assert_eq!(summary.trend, Some(ShareTrend::Rising));
        let top = summary.top_country.as_ref().unwrap();
        assert_eq!(top.country_code, "US");
        assert!((top.share - 0.1).abs() < 1e-9);
        assert!(!summary.is_organic_baseline());
    }

    #[test]
    fn test_promoted_summary_without_data() {
        let summary = promoted_summary(&ResultFrame::empty()).unwrap();
        assert_eq!(summary.level, PaidLevel::Unknown);
        assert!(summary.is_organic_baseline());
    }

    #[test]
    fn test_momentum_latest_slice() {
        let f = frame(
            &["dt", "hashtag", "view_delta"],
            vec![
                vec![json!("2024-01-01"), json!("a"), json!("x")],
                vec![json!("2024-01-02"), json!("b"), json!(7)],
                vec![json!("2024-01-02"), json!("c"), Value::Null],
            ],
        );
        let prepared = prepare_momentum(f);
        assert_eq!(prepared.number(0, "view_delta"), Some(0.0));
        assert_eq!(prepared.number(0, "rank_velocity"), Some(0.0));
        let latest = latest_slice(&prepared, "dt");
        assert_eq!(latest.texts("hashtag"), vec!["b", "c"]);
        assert_eq!(latest.number(1, "view_delta"), Some(0.0));
    }
}
