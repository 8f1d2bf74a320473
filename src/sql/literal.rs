//! Value sanitizer.
//!
//! Every user-supplied value that ends up inside generated SQL goes through
//! this module. [`SqlLiteral`] can only be built here, so code that wants to
//! embed a value has no way around the quoting rules.

use chrono::NaiveDate;
use std::fmt;

/// A rendered SQL literal (or comma-joined list of literals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlLiteral(String);

impl SqlLiteral {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wrap a scalar in single quotes, doubling embedded quotes.
pub fn quote(value: impl fmt::Display) -> SqlLiteral {
    SqlLiteral(format!("'{}'", value.to_string().replace('\'', "''")))
}

/// Like [`quote`], but `None` renders as the `NULL` keyword.
pub fn quote_nullable<T: fmt::Display>(value: Option<T>) -> SqlLiteral {
    match value {
        Some(v) => quote(v),
        None => SqlLiteral("NULL".to_string()),
    }
}

/// Comma-joined quoted values for an `IN (...)` predicate.
///
/// The caller supplies the parentheses.
pub fn quote_list<I, T>(values: I) -> SqlLiteral
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let parts: Vec<String> = values.into_iter().map(|v| quote(v).0).collect();
    SqlLiteral(parts.join(","))
}

/// `'%keyword%'` for a case-insensitive substring match against a
/// `LOWER(...)` expression.
pub fn like_contains(keyword: &str) -> SqlLiteral {
    quote(format!("%{}%", keyword.to_lowercase()))
}

/// `DATE('YYYY-MM-DD')`.
pub fn date(value: NaiveDate) -> SqlLiteral {
    SqlLiteral(format!("DATE({})", quote(value.format("%Y-%m-%d"))))
}

/// Integer literals need no quoting but still go through the sanitizer type.
pub fn integer(value: i64) -> SqlLiteral {
    SqlLiteral(value.to_string())
}
