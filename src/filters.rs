//! Global filter selections for one render pass.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sentinel meaning "no restriction" in country/industry selections.
pub const ALL: &str = "ALL";

/// Allowed top-N sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TopN {
    Ten,
    #[default]
    Twenty,
    Thirty,
    Fifty,
    Hundred,
}

impl TopN {
    pub const CHOICES: [TopN; 5] = [TopN::Ten, TopN::Twenty, TopN::Thirty, TopN::Fifty, TopN::Hundred];

    pub fn value(&self) -> usize {
        match self {
            TopN::Ten => 10,
            TopN::Twenty => 20,
            TopN::Thirty => 30,
            TopN::Fifty => 50,
            TopN::Hundred => 100,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        Self::CHOICES.into_iter().find(|n| n.value() == value as usize)
    }
}

/// Raw filter input as it arrives from the UI / CLI, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub countries: Vec<String>,
    pub industries: Vec<String>,
    pub keyword: String,
    pub top_n: Option<u32>,
}

/// Immutable filter state threaded through every query builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub countries: Vec<String>,
    pub industries: Vec<String>,
    /// Lower-cased and trimmed; empty means no keyword filter.
    pub keyword: String,
    pub top_n: TopN,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            countries: vec![ALL.to_string()],
            industries: vec![ALL.to_string()],
            keyword: String::new(),
            top_n: TopN::default(),
        }
    }
}

impl FilterState {
    /// Validate raw input. Malformed values are treated as absent rather
    /// than rejected.
    pub fn from_input(raw: RawFilters) -> Self {
        let top_n = match raw.top_n {
            Some(n) => TopN::from_value(n).unwrap_or_else(|| {
                debug!("Ignoring unsupported top-N value {}", n);
                TopN::default()
            }),
            None => TopN::default(),
        };

        Self {
            start_date: raw.start_date.as_deref().and_then(coerce_date),
            end_date: raw.end_date.as_deref().and_then(coerce_date),
            countries: dedup_selection(raw.countries),
            industries: dedup_selection(raw.industries),
            keyword: raw.keyword.trim().to_lowercase(),
            top_n,
        }
    }

    /// Both bounds, or nothing.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Selected countries with the `ALL` sentinel removed.
    pub fn active_countries(&self) -> Vec<&str> {
        active(&self.countries)
    }

    /// Selected industries with the `ALL` sentinel removed.
    pub fn active_industries(&self) -> Vec<&str> {
        active(&self.industries)
    }

    pub fn keyword(&self) -> Option<&str> {
        if self.keyword.is_empty() {
            None
        } else {
            Some(&self.keyword)
        }
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD hh:mm:ss` into a date.
pub fn coerce_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head: String = trimmed.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
}

fn active(selection: &[String]) -> Vec<&str> {
    selection
        .iter()
        .map(|s| s.as_str())
        .filter(|s| *s != ALL)
        .collect()
}

fn dedup_selection(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
