//! WHERE-clause compiler.
//!
//! Turns a [`FilterState`] plus a per-query [`ColumnBinding`] into a predicate
//! fragment that can be appended directly after a `FROM ...` clause. Clause
//! order is always date, country, industry, keyword.

use crate::filters::FilterState;
use crate::sql::dialect::Dialect;
use crate::sql::literal;

/// Granularity of the bound date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateGrain {
    #[default]
    Day,
    /// Column holds week starts; both bounds are truncated to their week.
    Week,
}

/// Which SQL expression each filter dimension applies to in one query.
///
/// A `None` field opts the query out of that filter. Nothing is defaulted by
/// the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnBinding {
    pub date: Option<String>,
    pub date_grain: DateGrain,
    pub country: Option<String>,
    pub industry: Option<String>,
    pub hashtag: Option<String>,
}

impl ColumnBinding {
    /// A binding with every dimension disabled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn date(mut self, expr: impl Into<String>) -> Self {
        self.date = Some(expr.into());
        self
    }

    pub fn week(mut self, expr: impl Into<String>) -> Self {
        self.date = Some(expr.into());
        self.date_grain = DateGrain::Week;
        self
    }

    pub fn country(mut self, expr: impl Into<String>) -> Self {
        self.country = Some(expr.into());
        self
    }

    pub fn industry(mut self, expr: impl Into<String>) -> Self {
        self.industry = Some(expr.into());
        self
    }

    pub fn hashtag(mut self, expr: impl Into<String>) -> Self {
        self.hashtag = Some(expr.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WhereCompiler {
    dialect: Dialect,
}

impl WhereCompiler {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// `WHERE a AND b ...`, or an empty string when no filter applies.
    pub fn compile(&self, filters: &FilterState, binding: &ColumnBinding) -> String {
        self.compile_with_base(filters, binding, Vec::new())
    }

    /// Same as [`compile`](Self::compile) with fixed predicates placed ahead
    /// of the filter clauses.
    pub fn compile_with_base(
        &self,
        filters: &FilterState,
        binding: &ColumnBinding,
        base: Vec<String>,
    ) -> String {
        let mut clauses = base;
        clauses.extend(self.clauses(filters, binding));
        if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        }
    }

    fn clauses(&self, filters: &FilterState, binding: &ColumnBinding) -> Vec<String> {
        let mut clauses = Vec::new();

        if let (Some(col), Some((start, end))) = (&binding.date, filters.date_range()) {
            let (start, end) = (literal::date(start), literal::date(end));
            let clause = match binding.date_grain {
                DateGrain::Day => format!("DATE({}) BETWEEN {} AND {}", col, start, end),
                DateGrain::Week => format!(
                    "DATE({}) BETWEEN {} AND {}",
                    col,
                    self.dialect.week_start(start.as_str()),
                    self.dialect.week_start(end.as_str())
                ),
            };
            clauses.push(clause);
        }

        if let Some(col) = &binding.country {
            let items = filters.active_countries();
            if !items.is_empty() {
                clauses.push(format!("{} IN ({})", col, literal::quote_list(items)));
            }
        }

        if let Some(col) = &binding.industry {
            let items = filters.active_industries();
            if !items.is_empty() {
                clauses.push(format!("{} IN ({})", col, literal::quote_list(items)));
            }
        }

        if let (Some(expr), Some(keyword)) = (&binding.hashtag, filters.keyword()) {
            clauses.push(format!("LOWER({}) LIKE {}", expr, literal::like_contains(keyword)));
        }

        clauses
    }
}
