//! Analytical views over the trend lakehouse.
//!
//! Each view is SQL compiled from the current [`FilterState`] for one
//! [`Dialect`]. Views backed by a precomputed gold table come back as a
//! [`QueryPair`](crate::resolver::QueryPair) whose fallback recomputes the
//! same rows from `silver.silver_trend`; the rest are single statements.
//!
//! Every query names its own [`ColumnBinding`]: the same filter lands on
//! different expressions depending on the joins involved.

pub mod market;
pub mod promote;
pub mod trend;

use crate::filters::FilterState;
use crate::sql::{ColumnBinding, Dialect, WhereCompiler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SILVER_TREND: &str = "silver.silver_trend";
pub const GOLD_MOMENTUM: &str = "gold.trend_momentum";
pub const GOLD_RETENTION: &str = "gold.trend_retention";
pub const GOLD_LATEST_TOP100: &str = "gold.trend_latest_top100";
pub const GOLD_WEEKLY_SUMMARY: &str = "gold.trend_weekly_summary";
pub const GOLD_COUNTRY_SUMMARY: &str = "gold.trend_country_summary";
pub const GOLD_PROMOTED_SHARE: &str = "gold.trend_promoted_share";

/// Builds view SQL for one render pass.
#[derive(Debug, Clone)]
pub struct ViewSql<'a> {
    filters: &'a FilterState,
    dialect: Dialect,
    compiler: WhereCompiler,
}

impl<'a> ViewSql<'a> {
    pub fn new(filters: &'a FilterState, dialect: Dialect) -> Self {
        Self {
            filters,
            dialect,
            compiler: WhereCompiler::new(dialect),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.filters
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn filter(&self, binding: ColumnBinding) -> String {
        self.compiler.compile(self.filters, &binding)
    }

    fn filter_with(&self, binding: ColumnBinding, base: Vec<String>) -> String {
        self.compiler.compile_with_base(self.filters, &binding, base)
    }
}

/// Exportable views, addressed by name on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    Momentum,
    Retention,
    NewEntries,
    Opportunity,
    IndustryShare,
    IndustryEfficiency,
    CountryViews,
    Top100,
    Weekly,
    PromotedShare,
}

impl ViewKind {
    pub const ALL: [ViewKind; 10] = [
        ViewKind::Momentum,
        ViewKind::Retention,
        ViewKind::NewEntries,
        ViewKind::Opportunity,
        ViewKind::IndustryShare,
        ViewKind::IndustryEfficiency,
        ViewKind::CountryViews,
        ViewKind::Top100,
        ViewKind::Weekly,
        ViewKind::PromotedShare,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::Momentum => "momentum",
            ViewKind::Retention => "retention",
            ViewKind::NewEntries => "new-entries",
            ViewKind::Opportunity => "opportunity",
            ViewKind::IndustryShare => "industry-share",
            ViewKind::IndustryEfficiency => "industry-efficiency",
            ViewKind::CountryViews => "country-views",
            ViewKind::Top100 => "top100",
            ViewKind::Weekly => "weekly",
            ViewKind::PromotedShare => "promoted-share",
        }
    }

    /// Default CSV file name for an export.
    pub fn file_name(&self) -> &'static str {
        match self {
            ViewKind::Momentum => "momentum.csv",
            ViewKind::Retention => "retention.csv",
            ViewKind::NewEntries => "new_entries.csv",
            ViewKind::Opportunity => "opportunity_latest.csv",
            ViewKind::IndustryShare => "industry_share.csv",
            ViewKind::IndustryEfficiency => "industry_efficiency.csv",
            ViewKind::CountryViews => "views_by_country.csv",
            ViewKind::Top100 => "latest_top100.csv",
            ViewKind::Weekly => "weekly_summary.csv",
            ViewKind::PromotedShare => "promoted_share_by_country.csv",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|v| v.name()).collect();
                format!("unknown view '{}', expected one of: {}", s, names.join(", "))
            })
    }
}
