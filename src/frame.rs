//! Result frames returned by warehouse queries.
//!
//! A [`ResultFrame`] keeps the column names exactly as the engine reported
//! them, duplicates included. [`ResultFrame::normalize`] is the point where
//! names become unique; everything downstream (polars conversion, CSV export,
//! JSON payloads) relies on that.

use crate::error::{Result, TrendError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

/// A single cell. Engines that ship everything as text (Databricks
/// `JSON_ARRAY`) produce strings; numeric accessors coerce them.
pub type Cell = Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl ResultFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(TrendError::Execution(format!(
                "Row {} has {} cells but the frame has {} columns",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// No rows. A frame with columns but no rows is still empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Cell rendered as text; `None` for SQL NULL or a missing column.
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.cell(row, column).and_then(cell_text)
    }

    /// Cell coerced to a number; `None` when it is NULL or not numeric.
    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        self.cell(row, column).and_then(cell_number)
    }

    /// Every value of one column as text, NULLs skipped.
    pub fn texts(&self, column: &str) -> Vec<String> {
        (0..self.row_count()).filter_map(|i| self.text(i, column)).collect()
    }

    /// Drop later columns whose name exactly repeats an earlier one.
    pub fn dedupe(self) -> Self {
        if self.is_empty() {
            return self;
        }
        let mut seen = HashSet::new();
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| seen.insert(name.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.project(&keep)
    }

    /// Rename repeated names to `name__1`, `name__2`, ... in first-seen order.
    pub fn uniquify(mut self) -> Self {
        if self.is_empty() {
            return self;
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut renamed = Vec::with_capacity(self.columns.len());
        for name in &self.columns {
            match seen.get_mut(name) {
                Some(count) => {
                    *count += 1;
                    renamed.push(format!("{}__{}", name, count));
                }
                None => {
                    seen.insert(name.clone(), 0);
                    renamed.push(name.clone());
                }
            }
        }
        self.columns = renamed;
        self
    }

    /// `dedupe` then `uniquify`.
    pub fn normalize(self) -> Self {
        self.dedupe().uniquify()
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Keep only the named columns that exist, in the given order.
    pub fn select(&self, names: &[&str]) -> Self {
        let idx: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        self.clone().project(&idx)
    }

    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, r)| r.clone())
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Stable numeric sort on one column; non-numeric and NULL cells last.
    pub fn sort_by_number(&self, column: &str, descending: bool) -> Self {
        let Some(idx) = self.column_index(column) else {
            return self.clone();
        };
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            match (cell_number(&a[idx]), cell_number(&b[idx])) {
                (Some(x), Some(y)) => {
                    let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Replace every cell of `column` with its numeric value, `default` when
    /// it does not parse. A missing column is added filled with `default`.
    pub fn coerce_numeric(mut self, column: &str, default: f64) -> Self {
        let fill = |cell: &Cell| {
            let n = cell_number(cell).unwrap_or(default);
            serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
        };
        match self.column_index(column) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = fill(&row[idx]);
                }
            }
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(fill(&Value::Null));
                }
            }
        }
        self
    }

    /// Rows as JSON objects keyed by column name.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|c| cell_text(c).unwrap_or_default()))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| TrendError::Execution(format!("CSV output is not UTF-8: {}", e)))
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    fn project(self, idx: &[usize]) -> Self {
        let columns = idx.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Self { columns, rows }
    }
}

pub fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn cell_number(cell: &Cell) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultFrame {
        ResultFrame::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = ResultFrame::new(vec!["a".into()], vec![vec![json!(1), json!(2)]]);
        assert!(err.is_err());
    }

    #[test]
    fn test_uniquify_suffixes_in_first_seen_order() {
        let f = frame(
            &["hashtag", "views", "hashtag"],
            vec![vec![json!("a"), json!(1), json!("b")]],
        )
        .uniquify();
        assert_eq!(f.columns(), &["hashtag", "views", "hashtag__1"]);
        assert_eq!(f.text(0, "hashtag").as_deref(), Some("a"));
        assert_eq!(f.text(0, "hashtag__1").as_deref(), Some("b"));
        assert_eq!(f.number(0, "views"), Some(1.0));
    }

    #[test]
    fn test_uniquify_counts_each_name_separately() {
        let f = frame(
            &["a", "b", "a", "b", "a"],
            vec![vec![json!(1), json!(2), json!(3), json!(4), json!(5)]],
        )
        .uniquify();
        assert_eq!(f.columns(), &["a", "b", "a__1", "b__1", "a__2"]);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let f = frame(
            &["dt", "hashtag", "dt"],
            vec![vec![json!("2024-01-01"), json!("x"), json!("2024-02-02")]],
        )
        .dedupe();
        assert_eq!(f.columns(), &["dt", "hashtag"]);
        assert_eq!(f.text(0, "dt").as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_normalizer_is_noop_on_empty_frame() {
        let f = frame(&["a", "a"], vec![]);
        assert_eq!(f.clone().normalize(), f);
        assert_eq!(ResultFrame::empty().normalize(), ResultFrame::empty());
    }

    #[test]
    fn test_number_coerces_strings() {
        let f = frame(&["v"], vec![vec![json!("12.5")], vec![json!("n/a")], vec![Value::Null]]);
        assert_eq!(f.number(0, "v"), Some(12.5));
        assert_eq!(f.number(1, "v"), None);
        assert_eq!(f.number(2, "v"), None);
    }

    #[test]
    fn test_sort_by_number_puts_nulls_last() {
        let f = frame(
            &["tag", "delta"],
            vec![
                vec![json!("a"), json!(5)],
                vec![json!("b"), Value::Null],
                vec![json!("c"), json!("9")],
            ],
        );
        let sorted = f.sort_by_number("delta", true);
        assert_eq!(sorted.texts("tag"), vec!["c", "a", "b"]);
        let asc = f.sort_by_number("delta", false);
        assert_eq!(asc.texts("tag"), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_csv_export() {
        let f = frame(
            &["hashtag", "views"],
            vec![vec![json!("a,b"), json!(3)], vec![json!("c"), Value::Null]],
        );
        assert_eq!(f.to_csv_string().unwrap(), "hashtag,views\n\"a,b\",3\nc,\n");
    }

    #[test]
    fn test_select_and_records() {
        let f = frame(
            &["hashtag", "rank", "views"],
            vec![vec![json!("a"), json!(1), json!(10)]],
        );
        let picked = f.select(&["views", "missing", "hashtag"]);
        assert_eq!(picked.columns(), &["views", "hashtag"]);
        let records = picked.records();
        assert_eq!(records[0]["hashtag"], json!("a"));
        assert_eq!(records[0]["views"], json!(10));
    }
}
